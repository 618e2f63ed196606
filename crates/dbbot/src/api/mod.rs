//! HTTP handlers for the chat page.

pub mod chat_api;
pub mod connect_api;
pub mod index_api;
pub mod session;

pub use chat_api::{chat, ChatRequest, ChatResponse};
pub use connect_api::{connect_db, ConnectResponse};
pub use index_api::index;
pub use session::{session_layer, SessionId, SESSION_COOKIE};

use crate::error::ChatError;
use crate::metrics;

/// Counts a handler result under its route.
pub(crate) fn observe<T>(route: &str, result: &Result<T, ChatError>) {
    let status = match result {
        Ok(_) => "200".to_string(),
        Err(e) => e.status_code().as_u16().to_string(),
    };
    metrics::inc_request(route, &status);
}
