//! Per-session conversation state and the store that holds it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::record::{ResultRecord, SqlValue};

/// One exchange: the user's question and the assistant's acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

/// Bounded short-term memory. Older turns are dropped, never summarized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMemory {
    window: usize,
    turns: VecDeque<ChatTurn>,
}

impl ConversationMemory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            turns: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.window {
            self.turns.pop_front();
        }
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ChatTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// A column/value pair from a previous single-row answer, used to scope follow-ups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpContext {
    pub key: String,
    pub value: String,
}

impl FollowUpContext {
    /// Matches a single row of exactly (text, number).
    pub fn from_records(records: &[ResultRecord]) -> Option<Self> {
        let [record] = records else {
            return None;
        };
        match record.fields() {
            [(key, SqlValue::Text(value)), (_, second)] if second.is_numeric() => Some(Self {
                key: key.clone(),
                value: value.clone(),
            }),
            _ => None,
        }
    }
}

/// What happens to the follow-up context after a turn whose result does not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextPolicy {
    /// Keep the previous context until a new matching result replaces it.
    #[default]
    PersistUntilReplaced,
    /// Drop the context as soon as a turn produces a non-matching result.
    ClearOnMismatch,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub db_uri: Option<String>,
    pub memory: Option<ConversationMemory>,
    pub last_query: Option<String>,
    pub last_query_context: Option<FollowUpContext>,
}

impl SessionState {
    /// Fresh state for a newly validated connection. Nothing from a prior connection survives.
    pub fn connected(db_uri: String, memory_window: usize) -> Self {
        Self {
            db_uri: Some(db_uri),
            memory: Some(ConversationMemory::new(memory_window)),
            last_query: None,
            last_query_context: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.db_uri.is_some() && self.memory.is_some()
    }

    /// Applies a successful turn: memory, last query and follow-up context.
    pub fn record_success(
        &mut self,
        question: &str,
        sql: &str,
        records: &[ResultRecord],
        policy: ContextPolicy,
    ) {
        if let Some(memory) = self.memory.as_mut() {
            memory.push(ChatTurn {
                user: question.to_string(),
                assistant: format!("SQL: `{}`", sql),
            });
        }
        self.last_query = Some(sql.to_string());

        match FollowUpContext::from_records(records) {
            Some(context) => self.last_query_context = Some(context),
            None if policy == ContextPolicy::ClearOnMismatch => self.last_query_context = None,
            None => {}
        }
    }
}

/// Keyed session storage. Handlers and the chat flow only see this capability.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Option<SessionState>;
    fn set(&self, session_id: &str, state: SessionState);
    fn clear(&self, session_id: &str);

    /// Drops sessions untouched for longer than `max_idle`.
    /// Returns how many of the dropped sessions held a connection.
    fn evict_idle(&self, max_idle: Duration) -> usize;
}

#[derive(Clone)]
struct StoredSession {
    state: SessionState,
    touched: Instant,
}

#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    store: Arc<DashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, session_id: &str) -> Option<SessionState> {
        self.store.get_mut(session_id).map(|mut entry| {
            entry.touched = Instant::now();
            entry.state.clone()
        })
    }

    fn set(&self, session_id: &str, state: SessionState) {
        self.store.insert(
            session_id.to_string(),
            StoredSession {
                state,
                touched: Instant::now(),
            },
        );
    }

    fn clear(&self, session_id: &str) {
        self.store.remove(session_id);
    }

    fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut connected = 0;
        self.store.retain(|_, entry| {
            let keep = entry.touched.elapsed() <= max_idle;
            if !keep && entry.state.is_connected() {
                connected += 1;
            }
            keep
        });
        connected
    }
}
