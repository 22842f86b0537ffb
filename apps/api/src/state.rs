use std::sync::Arc;

use crate::config::Config;
use crate::idp::IdpAdapter;
use crate::pipeline::Pipeline;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub idp: Arc<dyn IdpAdapter>,
    /// Owns the work queue; cloning shares it.
    pub pipeline: Pipeline,
    pub config: Config,
}
