// /server/src/state.rs
use std::sync::Arc;

use crate::config::Config;
use crate::repository::LooRepository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn LooRepository>,
    pub config: Config,
}

impl AppState {
    pub fn new(repo: Arc<dyn LooRepository>, config: Config) -> Self {
        Self { repo, config }
    }
}
