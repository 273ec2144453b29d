//! One-shot insight generation over an OpenAI-style chat completion
//! endpoint. Stateless: one request per invocation, no retry, no caching;
//! any failure degrades to a fixed fallback string.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use thiserror::Error;

use crate::models::Expense;

/// Shown in place of the analysis when the upstream call fails.
pub const INSIGHTS_FALLBACK: &str = "Error generating insights. Please try again later.";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Error)]
enum InsightsError {
    #[error("request failed: {0}")]
    Http(#[from] Box<ureq::Error>),
    #[error("invalid response body: {0}")]
    Body(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("empty completion")]
    Empty,
}

pub struct InsightsClient {
    base_url: String,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

impl InsightsClient {
    /// Returns `None` when no API key is configured; the dashboard then
    /// reports that insights are unavailable instead of calling out.
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("INSIGHTS_API_KEY").ok().filter(|k| !k.is_empty())?;
        let base_url = env::var("INSIGHTS_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("INSIGHTS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            agent: ureq::Agent::new(),
        })
    }

    /// Delegate the filtered snapshot to the model and return its raw text.
    /// This blocks on network I/O; call it from a blocking task.
    pub fn generate(&self, expenses: &[Expense]) -> String {
        let prompt = build_prompt(expenses);
        match self.chat(&prompt) {
            Ok(text) => text,
            Err(err) => {
                log::error!("insight generation failed: {}", err);
                INSIGHTS_FALLBACK.to_string()
            }
        }
    }

    fn chat(&self, prompt: &str) -> Result<String, InsightsError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![json!({ "role": "user", "content": prompt })],
            temperature: 0.7,
        };

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_json(serde_json::to_value(&request)?)
            .map_err(Box::new)?;

        let body: ChatResponse = response.into_json()?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(InsightsError::Empty)
    }
}

/// Serialize the filtered expenses into the analysis prompt. Only the
/// fields the model needs are included.
fn build_prompt(expenses: &[Expense]) -> String {
    let summary: Vec<serde_json::Value> = expenses
        .iter()
        .map(|e| {
            json!({
                "amount": e.amount,
                "category": e.category().as_str(),
                "date": e.date.format("%Y-%m-%d").to_string(),
                "desc": e.description,
                "project": e.project,
            })
        })
        .collect();

    format!(
        "Analyze these monthly expenses and provide 3-4 concise, professional \
         financial insights or savings tips.\n\
         Categories focused on: Local Travel, Accommodation, Daily Allowance, \
         Maintenance, Repairs.\n\
         Include considerations for spending efficiency across different projects.\n\n\
         Data: {}\n\n\
         Respond in a friendly but professional tone. Focus on patterns or \
         unusual spending.",
        serde_json::Value::Array(summary)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryDetails, ExpenseStatus};
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn prompt_contains_only_summary_fields() {
        let expense = Expense {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Alice".to_string(),
            amount: "120.00".parse().unwrap(),
            date: NaiveDate::from_ymd_opt(2026, 7, 3).unwrap(),
            description: "Team lunch".to_string(),
            project: "Phoenix".to_string(),
            doc_number: "D-9".to_string(),
            receipt_url: None,
            note: Some("secret note".to_string()),
            status: ExpenseStatus::Pending,
            details: CategoryDetails::FoodAllowance {
                breakfast: false,
                lunch: true,
                dinner: false,
            },
        };

        let prompt = build_prompt(&[expense]);
        assert!(prompt.contains("Team lunch"));
        assert!(prompt.contains("Food Allowance"));
        assert!(prompt.contains("2026-07-03"));
        assert!(prompt.contains("Phoenix"));
        // User identity and free-form notes are not shipped out.
        assert!(!prompt.contains("Alice"));
        assert!(!prompt.contains("secret note"));
    }
}
