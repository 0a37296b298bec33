use crate::llm::models::PromptPair;

/// Builds the fixed instruction pair for one question. Pure; the question is
/// passed through as given.
pub fn compose_prompt(question: &str, schema_text: &str, dialect: &str) -> PromptPair {
    let system = format!(
        "You are a SQL expert. Generate valid {dialect} queries based on user questions and database schema."
    );

    let user = format!(
        r#"You are a SQL expert. Given the following database schema and a question, generate a valid {dialect} SQL query.

Database Schema:
{schema_text}

Question: {question}

Generate a {dialect} SQL query that answers this question. Return ONLY the SQL query, no explanations or markdown formatting.
"#
    );

    PromptPair { system, user }
}
