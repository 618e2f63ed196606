// dbbot/crates/dbbot/src/lib.rs

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod formatter;
pub mod llm_client;
pub mod metrics;
pub mod prompt;
pub mod record;
pub mod repair;
pub mod server;
pub mod session;
pub mod sql_extractor;
pub mod state;
pub mod telemetry;

// Public API exports
pub use config::Config;
pub use error::{ChatError, ConfigurationError, ConnectionError, ExecutionError, GenerationError};
pub use llm_client::{build_llm_client, CohereClient, LlmClient, LlmHandle};
pub use record::{ResultRecord, SqlValue};
pub use repair::{RepairLoop, RepairOutcome, TurnContext};
pub use server::{build_router, run_server, spawn_session_sweeper};
pub use session::{InMemorySessionStore, SessionState, SessionStore};
pub use state::AppState;
