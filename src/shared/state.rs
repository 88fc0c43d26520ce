use std::sync::Arc;

use crate::classifier::ClassifierClient;
use crate::config::AppConfig;
use crate::tickets::engine::TicketEngine;

/// Shared per-process state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<TicketEngine>,
    pub classifier: Arc<ClassifierClient>,
}
