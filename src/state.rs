//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Live session state belongs to the coordinator task, so handlers only
//! hold its handle. REST handlers read the action log directly; it is
//! shared with the coordinator and the persistence writer.

use std::sync::Arc;

use crate::config::Config;
use crate::coordinator::CoordinatorHandle;
use crate::services::action_log::ActionLog;

/// Shared application state. Clone is required by Axum; all inner fields
/// are handles or Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub log: Arc<dyn ActionLog>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(coordinator: CoordinatorHandle, log: Arc<dyn ActionLog>, config: Config) -> Self {
        Self { coordinator, log, config: Arc::new(config) }
    }
}

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
