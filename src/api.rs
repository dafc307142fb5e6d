//! HTTP API
//!
//! Thin glue: one route runs a turn, one resets a user's conversation state.

mod handlers;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::runtime::ConversationManager;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState<S> {
    pub manager: Arc<ConversationManager<S>>,
}

impl<S> AppState<S> {
    pub fn new(manager: ConversationManager<S>) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}
