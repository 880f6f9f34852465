use crate::{config::AppConfig, executor::Engine};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Engine,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: Engine) -> Self {
        Self { config, engine }
    }
}
