//! Trivia API wire types and the HTTP transport seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::TriviaError;

/// Response code the API uses for a successful query.
pub const RESPONSE_OK: i64 = 0;

/// Raw HTTP result handed back by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Anything that can perform a GET against the trivia API.
#[async_trait]
pub trait TriviaTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TriviaError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, TriviaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .user_agent(concat!("triviashorts/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TriviaError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl TriviaTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TriviaError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

/// A prepared query: which endpoint, how many questions, which category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriviaQuery {
    pub base_url: String,
    pub amount: u32,
    pub category_id: u32,
    pub question_type: String,
    /// Short display label derived from the category name.
    pub label: String,
}

impl TriviaQuery {
    pub fn url(&self) -> String {
        format!(
            "{}?amount={}&category={}&type={}",
            self.base_url, self.amount, self.category_id, self.question_type
        )
    }
}

/// Top-level API payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaResponse {
    pub response_code: i64,
    #[serde(default)]
    pub results: Vec<RawQuestion>,
}

impl TriviaResponse {
    pub fn is_ok(&self) -> bool {
        self.response_code == RESPONSE_OK
    }
}

/// One question exactly as the API sends it (HTML-entity encoded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub category: String,
    #[serde(rename = "type", default)]
    pub question_type: String,
    #[serde(default)]
    pub difficulty: String,
    pub question: String,
    pub correct_answer: String,
    #[serde(default)]
    pub incorrect_answers: Vec<String>,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport that replays canned responses and records requested URLs.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<TransportResponse>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<TransportResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TriviaTransport for ScriptedTransport {
        async fn get(&self, url: &str) -> Result<TransportResponse, TriviaError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TriviaError::ConfigError("script exhausted".to_string()))
        }
    }

    pub fn question_json(category: &str, question: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "multiple",
            "difficulty": "easy",
            "category": category,
            "question": question,
            "correct_answer": "Paris",
            "incorrect_answers": ["London", "Berlin", "Madrid"]
        })
    }

    pub fn ok_body(category: &str, count: usize) -> String {
        let results: Vec<_> = (0..count)
            .map(|i| question_json(category, &format!("Question {}?", i)))
            .collect();
        serde_json::json!({ "response_code": 0, "results": results }).to_string()
    }
}
