//! Generation and repair prompts for the SQL model.

use crate::database::Dialect;
use crate::session::{ChatTurn, FollowUpContext};

/// Inputs for the first attempt of a turn.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub dialect: Dialect,
    pub schema: &'a str,
    pub history: &'a [ChatTurn],
    pub question: &'a str,
    pub follow_up: Option<&'a FollowUpContext>,
}

/// Inputs for a retry after the database rejected a statement.
#[derive(Debug, Clone)]
pub struct RepairRequest<'a> {
    pub dialect: Dialect,
    pub schema: &'a str,
    pub question: &'a str,
    pub failing_sql: &'a str,
    pub error: &'a str,
}

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn generation(req: &GenerationRequest<'_>) -> String {
        let mut prompt = format!(
            "You are an expert SQL assistant for {dialect}.\n\
             SCHEMA:\n{schema}\n\n\
             HISTORY:\n{history}\n\n\
             QUESTION: {question}\n",
            dialect = req.dialect,
            schema = req.schema,
            history = format_history(req.history),
            question = req.question,
        );

        if let Some(context) = req.follow_up {
            prompt.push_str(&follow_up_instruction(context));
            prompt.push('\n');
        }

        prompt.push_str(
            "RULES: Write exactly one SQL statement. Use SELECT *. \
             Use LIMIT if the question asks for a specific number of rows. \
             Use GROUP BY for counting questions.\n\
             OUTPUT ONLY THE SQL IN A CODE BLOCK: ```sql ... ```",
        );
        prompt
    }

    pub fn repair(req: &RepairRequest<'_>) -> String {
        format!(
            "ERROR REFLECTION: The previous SQL query failed.\n\
             DATABASE TYPE: {dialect}\n\
             FAILING SQL: {sql}\n\
             ERROR FROM DATABASE: {error}\n\n\
             TASK: Analyze the error and generate a fixed, valid SQL query for the question: \"{question}\".\n\
             Ensure table names and column names match the schema exactly.\n\
             SCHEMA:\n{schema}\n\n\
             OUTPUT ONLY THE SQL IN A CODE BLOCK: ```sql ... ```",
            dialect = req.dialect,
            sql = req.failing_sql,
            error = req.error,
            question = req.question,
            schema = req.schema,
        )
    }
}

fn format_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    history
        .iter()
        .map(|turn| format!("Human: {}\nAI: {}", turn.user, turn.assistant))
        .collect::<Vec<_>>()
        .join("\n")
}

fn follow_up_instruction(context: &FollowUpContext) -> String {
    let value = context.value.replace('\'', "''");
    format!(
        "CONTEXT: User previously found {key}='{value}'. Answer the follow-up using UPPER({key})=UPPER('{value}').",
        key = context.key,
        value = value,
    )
}
