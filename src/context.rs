use crate::config::AppConfig;
use crate::core::{Runner, Scheduler};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub runner: Arc<Runner>,
    pub scheduler: Arc<Scheduler>,
}

impl AppContext {
    pub fn new(config: AppConfig, runner: Arc<Runner>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            scheduler,
        }
    }
}
