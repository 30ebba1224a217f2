//! Trivia fetching with backoff on rate limiting.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::{TriviaQuery, TriviaResponse, TriviaTransport};
use crate::item::TriviaItem;
use crate::retry::RetryPolicy;

const STATUS_OK: u16 = 200;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Retrieves and prepares the questions for a query.
pub struct TriviaFetcher {
    transport: Arc<dyn TriviaTransport>,
    retry: RetryPolicy,
    rng: StdRng,
}

/// What a single request told us to do next.
enum Attempt {
    Done(Vec<TriviaItem>),
    Retry,
    Abort,
}

impl TriviaFetcher {
    pub fn new(transport: Arc<dyn TriviaTransport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Use a deterministic random source for option shuffling.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Fetch the questions for `query`.
    ///
    /// Rate limiting (HTTP 429, or a non-zero API response code) is retried
    /// with exponential backoff up to the policy's attempt limit. Any other
    /// failure gives up at once. An empty result means the caller cannot
    /// proceed.
    pub async fn fetch(&mut self, query: &TriviaQuery) -> Vec<TriviaItem> {
        let url = query.url();
        let attempts = self.retry.max_attempts();
        info!(%url, "Fetching trivia");

        for attempt in 1..=attempts {
            match self.attempt(&url).await {
                Attempt::Done(items) => return items,
                Attempt::Abort => return Vec::new(),
                Attempt::Retry if attempt < attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!("Retrying in {} seconds...", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                }
                Attempt::Retry => {}
            }
        }

        error!(attempts, "Giving up on trivia fetch after repeated rate limiting");
        Vec::new()
    }

    async fn attempt(&mut self, url: &str) -> Attempt {
        let response = match self.transport.get(url).await {
            Ok(response) => response,
            Err(e) => {
                error!("Trivia request failed: {}", e);
                return Attempt::Abort;
            }
        };

        match response.status {
            STATUS_OK => {}
            STATUS_TOO_MANY_REQUESTS => {
                warn!("Received 429 Too Many Requests");
                return Attempt::Retry;
            }
            status => {
                error!("Error: {}", status);
                return Attempt::Abort;
            }
        }

        let data: TriviaResponse = match serde_json::from_str(&response.body) {
            Ok(data) => data,
            Err(e) => {
                error!("Trivia response was not valid JSON: {}", e);
                return Attempt::Abort;
            }
        };

        if !data.is_ok() {
            warn!(response_code = data.response_code, "Trivia API did not return results");
            return Attempt::Retry;
        }

        let items: Vec<TriviaItem> = data
            .results
            .iter()
            .filter_map(|raw| {
                let item = TriviaItem::from_raw(raw, &mut self.rng);
                if item.is_none() {
                    warn!(question = %raw.question, "Skipping question without four options");
                }
                item
            })
            .collect();

        info!(count = items.len(), "Fetched trivia questions");
        Attempt::Done(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransportResponse;
    use crate::api::testing::{ScriptedTransport, ok_body};
    use std::time::Duration;

    fn query() -> TriviaQuery {
        TriviaQuery {
            base_url: "https://opentdb.com/api.php".to_string(),
            amount: 5,
            category_id: 22,
            question_type: "multiple".to_string(),
            label: "Geography".to_string(),
        }
    }

    fn fetcher(transport: Arc<ScriptedTransport>) -> TriviaFetcher {
        TriviaFetcher::new(transport, RetryPolicy::default()).with_rng(StdRng::seed_from_u64(9))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_success() {
        let transport = Arc::new(ScriptedTransport::new(vec![TransportResponse::new(
            200,
            ok_body("Geography", 5),
        )]));
        let items = fetcher(transport.clone()).fetch(&query()).await;

        assert_eq!(items.len(), 5);
        for item in &items {
            assert_eq!(item.answer_options.len(), 4);
            assert_eq!(item.answer_options[item.correct_index], item.correct_answer);
        }
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_on_rate_limit() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            TransportResponse::new(429, ""),
            TransportResponse::new(429, ""),
            TransportResponse::new(429, ""),
            TransportResponse::new(200, ok_body("Geography", 5)),
        ]));

        let started = tokio::time::Instant::now();
        let items = fetcher(transport.clone()).fetch(&query()).await;

        assert_eq!(items.len(), 5);
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 4));
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_nonzero_response_code() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            TransportResponse::new(200, r#"{"response_code": 5, "results": []}"#),
            TransportResponse::new(200, ok_body("Geography", 5)),
        ]));
        let items = fetcher(transport.clone()).fetch(&query()).await;

        assert_eq!(items.len(), 5);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling() {
        let responses = (0..10).map(|_| TransportResponse::new(429, "")).collect();
        let transport = Arc::new(ScriptedTransport::new(responses));

        let started = tokio::time::Instant::now();
        let items = fetcher(transport.clone()).fetch(&query()).await;

        assert!(items.is_empty());
        assert_eq!(transport.request_count(), 5);
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 4 + 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_aborts_immediately() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            TransportResponse::new(500, "internal error"),
            TransportResponse::new(200, ok_body("Geography", 5)),
        ]));

        let started = tokio::time::Instant::now();
        let items = fetcher(transport.clone()).fetch(&query()).await;

        assert!(items.is_empty());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_json_aborts() {
        let transport = Arc::new(ScriptedTransport::new(vec![TransportResponse::new(
            200,
            "<html>maintenance</html>",
        )]));
        assert!(fetcher(transport.clone()).fetch(&query()).await.is_empty());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_gives_up_without_retry() {
        // An empty script makes every request fail at the transport level.
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));

        let started = tokio::time::Instant::now();
        let items = fetcher(transport.clone()).fetch(&query()).await;

        assert!(items.is_empty());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
