use std::sync::Arc;

use solver_ga::GaScheduler;
use types::GaParams;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<GaScheduler>,
}

impl AppState {
    /// `defaults` apply to requests that carry no `params` of their own.
    pub fn new(defaults: GaParams) -> Self {
        Self {
            scheduler: Arc::new(GaScheduler::with_params(defaults)),
        }
    }
}
