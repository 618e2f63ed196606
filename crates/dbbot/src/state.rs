//! Application state shared by every handler.

use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmHandle;
use crate::session::{InMemorySessionStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    /// Read-only after startup.
    pub config: Arc<Config>,
    /// The LLM client, or the configuration error that disables `/chat`.
    pub llm: LlmHandle,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(config: Config, llm: LlmHandle) -> Self {
        Self::with_store(config, llm, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_store(config: Config, llm: LlmHandle, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            config: Arc::new(config),
            llm,
            sessions,
        }
    }
}
