use std::sync::Arc;

use crate::agent::Agent;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
}

impl AppState {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }
}
