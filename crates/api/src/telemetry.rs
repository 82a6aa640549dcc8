use std::time::Duration;

use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::trace::HttpMakeClassifier;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Long enough for a full-size run at default parameters.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub fn stack() -> ServiceBuilder<
    Stack<
        TimeoutLayer,
        Stack<RequestBodyLimitLayer, Stack<CorsLayer, Stack<TraceLayer<HttpMakeClassifier>, Identity>>>,
    >,
> {
    let trace = TraceLayer::new_for_http();
    let cors = CorsLayer::permissive();
    let limit = RequestBodyLimitLayer::new(2 * 1024 * 1024);

    ServiceBuilder::new()
        .layer(trace)
        .layer(cors)
        .layer(limit)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
