//! Application state.

use std::sync::Arc;

use tokio::sync::Notify;

use payflow_store::RocksStore;

use crate::config::ServiceConfig;
use crate::indexer::OrderIndexer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Wakes the order index consumer after an order commits.
    pub index_nudge: Arc<Notify>,
}

impl AppState {
    /// Create the application state and spawn the order index consumer.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let indexer = OrderIndexer::new(Arc::clone(&store), &config);
        let index_nudge = indexer.nudge_handle();
        indexer.spawn();

        Self {
            store,
            config,
            index_nudge,
        }
    }
}
