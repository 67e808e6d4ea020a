use crate::{config::AppConfig, query::QueryEngine};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<QueryEngine>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: Arc<QueryEngine>) -> Self {
        Self { config, engine }
    }
}
