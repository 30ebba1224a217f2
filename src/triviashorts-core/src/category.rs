//! Category selection: probe the API until a category yields questions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{TriviaQuery, TriviaResponse, TriviaTransport};
use crate::config::ApiConfig;
use crate::error::TriviaError;
use crate::retry::RetryPolicy;
use crate::text::category_label;

/// Picks a category and confirms the API can serve it.
pub struct CategorySelector {
    transport: Arc<dyn TriviaTransport>,
    base_url: String,
    amount: u32,
    question_type: String,
    categories: RangeInclusive<u32>,
    pinned: Option<u32>,
    retry: RetryPolicy,
    rng: StdRng,
}

impl CategorySelector {
    pub fn new(transport: Arc<dyn TriviaTransport>, config: &ApiConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            amount: config.amount,
            question_type: config.question_type.clone(),
            categories: config.category_min..=config.category_max,
            pinned: config.category,
            retry: config.probe_retry(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Use a deterministic random source.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Probe random categories until one answers with results.
    ///
    /// Each rejected probe waits according to the retry policy; once the
    /// attempts run out this fails with `ProbeExhausted`.
    pub async fn select(&mut self) -> Result<TriviaQuery, TriviaError> {
        if self.pinned.is_none() && self.categories.is_empty() {
            return Err(TriviaError::ConfigError(format!(
                "empty category range {}..={}",
                self.categories.start(),
                self.categories.end()
            )));
        }
        let attempts = self.retry.max_attempts();

        for attempt in 1..=attempts {
            let category_id = self.pick_category();
            let query = TriviaQuery {
                base_url: self.base_url.clone(),
                amount: self.amount,
                category_id,
                question_type: self.question_type.clone(),
                label: String::new(),
            };

            if let Some(label) = self.probe(&query).await {
                info!(category_id, %label, "Selected trivia category");
                return Ok(TriviaQuery { label, ..query });
            }

            if attempt < attempts {
                let delay = self.retry.delay_for(attempt);
                debug!(attempt, ?delay, "Category probe rejected, backing off");
                tokio::time::sleep(delay).await;
            }
        }

        Err(TriviaError::ProbeExhausted { attempts })
    }

    fn pick_category(&mut self) -> u32 {
        match self.pinned {
            Some(id) => id,
            None => self.rng.random_range(self.categories.clone()),
        }
    }

    /// Returns the display label if the category is usable.
    async fn probe(&self, query: &TriviaQuery) -> Option<String> {
        let url = query.url();
        let response = match self.transport.get(&url).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, "Category probe failed: {}", e);
                return None;
            }
        };

        if response.status != 200 {
            warn!(%url, status = response.status, "Category probe returned non-success status");
            return None;
        }

        let data: TriviaResponse = match serde_json::from_str(&response.body) {
            Ok(data) => data,
            Err(e) => {
                warn!(%url, "Category probe returned invalid JSON: {}", e);
                return None;
            }
        };

        if !data.is_ok() || data.results.is_empty() {
            debug!(%url, response_code = data.response_code, "Category has no usable results");
            return None;
        }

        let label = category_label(&data.results[0].category);
        if label.is_none() {
            warn!(category = %data.results[0].category, "Category name has no alphabetic label");
        }
        label
    }
}
