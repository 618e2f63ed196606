//! The bounded generate → execute → repair loop behind every chat turn.
//!
//! Attempt 0 uses the generation prompt. Each later attempt uses the repair prompt built
//! from the immediately preceding failure only. The loop stops at the first success, at
//! the attempt cap, or as soon as the LLM call itself fails.

use tracing::{error, info, warn};

use crate::database::DatabaseConnection;
use crate::error::{ChatError, ExecutionError};
use crate::llm_client::LlmClient;
use crate::metrics;
use crate::prompt::{GenerationRequest, PromptBuilder, RepairRequest};
use crate::record::ResultRecord;
use crate::session::{ChatTurn, FollowUpContext};
use crate::sql_extractor::extract_sql;

/// What the user asked, plus the session context the first prompt may use.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub question: &'a str,
    pub history: &'a [ChatTurn],
    pub follow_up: Option<&'a FollowUpContext>,
}

#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub sql: String,
    pub error: ExecutionError,
}

#[derive(Debug)]
pub enum AttemptState {
    Attempting {
        index: usize,
        failure: Option<FailedAttempt>,
    },
    Succeeded {
        sql: String,
        records: Vec<ResultRecord>,
    },
    ExhaustedFailure(ExecutionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Rows(usize),
    Error(String),
}

/// One executed statement, kept for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAttempt {
    pub index: usize,
    pub sql: String,
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
pub struct RepairOutcome {
    pub sql: String,
    pub records: Vec<ResultRecord>,
    pub attempts: Vec<QueryAttempt>,
}

pub struct RepairLoop<'a> {
    llm: &'a dyn LlmClient,
    max_attempts: usize,
}

impl<'a> RepairLoop<'a> {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(llm: &'a dyn LlmClient, max_attempts: usize) -> Self {
        Self {
            llm,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn run(
        &self,
        conn: &mut dyn DatabaseConnection,
        schema: &str,
        turn: &TurnContext<'_>,
    ) -> Result<RepairOutcome, ChatError> {
        let dialect = conn.dialect();
        let mut attempts = Vec::with_capacity(self.max_attempts);
        let mut state = AttemptState::Attempting {
            index: 0,
            failure: None,
        };

        loop {
            state = match state {
                AttemptState::Attempting { index, failure } => {
                    let prompt = match &failure {
                        None => PromptBuilder::generation(&GenerationRequest {
                            dialect,
                            schema,
                            history: turn.history,
                            question: turn.question,
                            follow_up: turn.follow_up,
                        }),
                        Some(failed) => PromptBuilder::repair(&RepairRequest {
                            dialect,
                            schema,
                            question: turn.question,
                            failing_sql: &failed.sql,
                            error: &failed.error.message,
                        }),
                    };

                    let raw = self.llm.generate(&prompt).await.map_err(|e| {
                        error!("Generation failed on attempt {}: {}", index + 1, e);
                        e
                    })?;
                    let sql = extract_sql(&raw);
                    info!("Attempt {}/{} SQL: {}", index + 1, self.max_attempts, sql);

                    match conn.execute(&sql).await {
                        Ok(records) => {
                            metrics::inc_query_attempt("success");
                            attempts.push(QueryAttempt {
                                index,
                                sql: sql.clone(),
                                outcome: AttemptOutcome::Rows(records.len()),
                            });
                            AttemptState::Succeeded { sql, records }
                        }
                        Err(error) => {
                            metrics::inc_query_attempt("failure");
                            warn!("Attempt {} failed: {}", index + 1, error);
                            attempts.push(QueryAttempt {
                                index,
                                sql: sql.clone(),
                                outcome: AttemptOutcome::Error(error.message.clone()),
                            });
                            if index + 1 >= self.max_attempts {
                                AttemptState::ExhaustedFailure(error)
                            } else {
                                AttemptState::Attempting {
                                    index: index + 1,
                                    failure: Some(FailedAttempt { sql, error }),
                                }
                            }
                        }
                    }
                }
                AttemptState::Succeeded { sql, records } => {
                    return Ok(RepairOutcome {
                        sql,
                        records,
                        attempts,
                    });
                }
                AttemptState::ExhaustedFailure(last_error) => {
                    error!("Giving up after {} attempts: {}", attempts.len(), last_error);
                    return Err(ChatError::ExhaustedRepair { last_error });
                }
            };
        }
    }
}
