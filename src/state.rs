use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::Data;
use crate::metrics::Metrics;

/// The shared application state handed to every handler.
///
/// Cloning is cheap: the pool, the cache and the config are all reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Database pool and cache.
    pub data: Data,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(data: Data, config: AppConfig) -> Self {
        Self { data, config: Arc::new(config), metrics: Metrics::new() }
    }
}
