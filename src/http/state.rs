use std::sync::Arc;

use crate::session::SessionDriver;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single session driver behind every endpoint
    pub driver: Arc<SessionDriver>,
}

impl AppState {
    pub fn new(driver: Arc<SessionDriver>) -> Self {
        Self { driver }
    }
}
