// Chat page: serving it starts a clean session.
use axum::{extract::State, response::Html, Extension};
use tracing::info;

use super::SessionId;
use crate::metrics;
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub async fn index(State(state): State<AppState>, Extension(session): Extension<SessionId>) -> Html<&'static str> {
    if let Some(previous) = state.sessions.get(session.as_str()) {
        if previous.is_connected() {
            metrics::dec_sessions();
        }
        info!("Page load cleared session {}", session.as_str());
    }
    state.sessions.clear(session.as_str());
    metrics::inc_request("/", "200");
    Html(INDEX_HTML)
}
