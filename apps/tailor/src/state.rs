use std::sync::Arc;

use crate::backend_client::ResumeApi;
use crate::config::Config;
use crate::tailoring::session::TailorSession;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The single editor session this process serves.
    pub session: Arc<TailorSession>,
    /// Same backend the session talks to. `BackendClient` in production.
    pub api: Arc<dyn ResumeApi>,
    pub config: Config,
}
