use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use sched_core::{ScheduleError, Scheduler};
use serde::Serialize;
use types::{ScheduleRequest, ScheduleResult};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct OptimizeError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OptimizeResponse {
    /// `scheduled`, `infeasible` or `invalid`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OptimizeError>,
    pub result: ScheduleResult,
}

impl From<Result<ScheduleResult, ScheduleError>> for OptimizeResponse {
    fn from(outcome: Result<ScheduleResult, ScheduleError>) -> Self {
        match outcome {
            Ok(result) => Self {
                status: "scheduled".into(),
                error: None,
                result,
            },
            Err(e) => Self {
                status: if e.is_input_error() { "invalid" } else { "infeasible" }.into(),
                error: Some(OptimizeError {
                    code: e.code().into(),
                    message: e.to_string(),
                }),
                result: ScheduleResult::default(),
            },
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/optimize/{course_id}",
    params(("course_id" = u64, Path, description = "Course to schedule")),
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Schedule, or an empty result with the reason it could not be built", body = OptimizeResponse),
        (status = 400, description = "Path and body disagree on the course")
    )
)]
pub async fn optimize(
    State(state): State<AppState>,
    Path(course_id): Path<u64>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<OptimizeResponse>, ApiError> {
    if req.course.id.0 != course_id {
        return Err(ApiError::BadRequest(format!(
            "path course {course_id} does not match body course {}",
            req.course.id
        )));
    }

    let scheduler = state.scheduler.clone();
    let outcome = tokio::task::spawn_blocking(move || scheduler.schedule(&req))
        .await
        .map_err(|e| ApiError::Internal(format!("scheduler task failed: {e}")))?;

    if let Err(e) = &outcome {
        tracing::warn!(course_id, code = e.code(), error = %e, "no schedule produced");
    }
    Ok(Json(outcome.into()))
}
