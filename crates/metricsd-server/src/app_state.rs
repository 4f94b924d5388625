//! Shared application state.
//!
//! The store is chosen once at startup and injected here; handlers never
//! branch on the backend type.

use std::sync::Arc;

use crate::store::MetricStore;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn MetricStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { inner: Arc::new(AppStateInner { store }) }
    }

    pub fn store(&self) -> &Arc<dyn MetricStore> {
        &self.inner.store
    }
}
