// Connection setup: validate the database once, then start a fresh conversation.
use axum::{
    extract::{Json, State},
    Extension,
};
use serde::Serialize;
use tracing::{info, warn};

use super::{observe, SessionId};
use crate::database::{self, redact_uri, ConnectionParams};
use crate::error::ChatError;
use crate::metrics;
use crate::session::SessionState;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: String,
}

pub async fn connect_db(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Json(params): Json<ConnectionParams>,
) -> Result<Json<ConnectResponse>, ChatError> {
    let result = connect(&state, &session, &params).await;
    observe("/connect_db", &result);
    result.map(Json)
}

async fn connect(state: &AppState, session: &SessionId, params: &ConnectionParams) -> Result<ConnectResponse, ChatError> {
    let uri = params.to_uri()?;
    if let Err(e) = database::validate(&uri, state.config.connect_options()).await {
        warn!("Connection to {} failed: {}", redact_uri(&uri), e);
        return Err(e.into());
    }

    let was_connected = state
        .sessions
        .get(session.as_str())
        .map(|s| s.is_connected())
        .unwrap_or(false);
    state.sessions.set(
        session.as_str(),
        SessionState::connected(uri, state.config.memory_window_turns),
    );
    if !was_connected {
        metrics::inc_sessions();
    }

    info!("Session {} connected to {} ({})", session.as_str(), params.db_name, params.db_type);
    Ok(ConnectResponse {
        success: format!("Connected to {}.", params.db_name),
    })
}
