//! `/chat`: one question in, one rendered answer out.
//!
//! The session is read once at the start of the turn and written once at the end. Every
//! turn opens its own database connection and closes it before returning.

use axum::{
    extract::{Json, State},
    Extension,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{observe, SessionId};
use crate::database::{self, DatabaseConnection, SchemaIntrospector};
use crate::error::ChatError;
use crate::formatter::format_results;
use crate::llm_client::LlmClient;
use crate::repair::{RepairLoop, RepairOutcome, TurnContext};
use crate::session::SessionState;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

pub async fn chat(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    let result = answer(&state, &session, &req.message).await;
    observe("/chat", &result);
    result.map(Json)
}

async fn answer(state: &AppState, session: &SessionId, question: &str) -> Result<ChatResponse, ChatError> {
    let mut session_state = state
        .sessions
        .get(session.as_str())
        .filter(SessionState::is_connected)
        .ok_or(ChatError::SessionNotFound)?;
    let llm = state.llm.clone()?;

    let uri = session_state.db_uri.clone().ok_or(ChatError::SessionNotFound)?;
    let mut conn = database::connect(&uri, state.config.connect_options()).await?;

    info!("Chat turn for session {}: {}", session.as_str(), question);
    let result = run_turn(state, conn.as_mut(), llm.as_ref(), &session_state, question).await;
    conn.close().await;
    let outcome = result?;

    debug!("Turn finished after {} attempt(s)", outcome.attempts.len());
    let html = format_results(&outcome.records);

    session_state.record_success(question, &outcome.sql, &outcome.records, state.config.context_policy());
    state.sessions.set(session.as_str(), session_state);

    Ok(ChatResponse { response: html })
}

async fn run_turn(
    state: &AppState,
    conn: &mut dyn DatabaseConnection,
    llm: &dyn LlmClient,
    session_state: &SessionState,
    question: &str,
) -> Result<RepairOutcome, ChatError> {
    let schema = SchemaIntrospector::new(state.config.schema_sample_rows)
        .describe(conn)
        .await?;

    let history = session_state
        .memory
        .as_ref()
        .map(|m| m.recent(state.config.prompt_history_turns))
        .unwrap_or_default();
    let turn = TurnContext {
        question,
        history: &history,
        follow_up: session_state.last_query_context.as_ref(),
    };

    RepairLoop::new(llm, state.config.max_query_attempts)
        .run(conn, &schema, &turn)
        .await
}
