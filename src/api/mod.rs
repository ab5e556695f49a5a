pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::*;

use crate::service::IncidentService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IncidentService>,
}

impl AppState {
    pub fn new(service: Arc<IncidentService>) -> Self {
        Self { service }
    }
}
