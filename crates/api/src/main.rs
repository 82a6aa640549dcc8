mod config;
mod error;
mod state;
mod telemetry;
pub mod routes {
    pub mod explain;
    pub mod health;
    pub mod optimize;
    pub mod validate;
}

use axum::{
    routing::{get, post},
    Router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            routes::health::health,
            routes::optimize::optimize,
            routes::validate::validate_handler,
            routes::explain::explain,
        ),
        components(schemas(
            types::ScheduleRequest, types::Course, types::Teacher, types::Room, types::Enrollment,
            types::GaParams, types::SlotId, types::CourseId, types::TeacherId, types::RoomId,
            types::EnrollmentId, types::ScheduleResult, types::ScheduledClass,
            types::ScheduledEnrollment, types::Diagnostics, types::PenaltyWeightsReport,
            types::GenerationStats,
            routes::optimize::OptimizeResponse,
            routes::optimize::OptimizeError,
            routes::validate::ValidationReport,
            routes::explain::ExplainIn,
            routes::explain::ExplainOut,
            routes::explain::Counts
        )),
        tags(
            (name = "cohort", description = "Course section scheduling API")
        )
    )]
struct ApiDoc;

fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/optimize/:course_id", post(routes::optimize::optimize))
        .route("/v1/validate", post(routes::validate::validate_handler))
        .route("/v1/explain", post(routes::explain::explain))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let defaults = config::ga_params_from_env()?;
    tracing::info!(
        population = defaults.population_size,
        generations = defaults.generations,
        seeded = defaults.seed.is_some(),
        "engine defaults loaded"
    );

    let addr = config::listen_addr()?;
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state::AppState::new(defaults))).await?;
    Ok(())
}
