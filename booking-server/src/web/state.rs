//! Application state for the web layer.

use std::sync::Arc;

use crate::config::ConfigHandle;
use crate::payment::PaymentBackend;
use crate::store::MemoryStore;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Reloadable booking configuration
    pub config: ConfigHandle,

    /// Connections, fleet and reservation ledgers
    pub store: MemoryStore,

    /// Payment provider
    pub payments: Arc<PaymentBackend>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(config: ConfigHandle, store: MemoryStore, payments: PaymentBackend) -> Self {
        Self {
            config,
            store,
            payments: Arc::new(payments),
        }
    }
}
