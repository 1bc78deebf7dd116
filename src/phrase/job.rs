//! Scheduled phrase generation
//!
//! One run asks the generation service for a phrase, validates the JSON it
//! returns and stores the result. The whole sequence is retried with
//! exponential backoff, so a rate-limited or flaky service does not cost
//! the day's phrase.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{PhraseError, Result};
use crate::phrase::generator::{PhraseGenerator, DEFAULT_PROMPT};
use crate::phrase::models::{JobReport, Phrase, REQUIRED_FIELDS};
use crate::phrase::store::PhraseStore;
use crate::utils::network::is_retryable_error;
use crate::utils::parser;
use crate::utils::retry::{with_exponential_backoff, RetryOptions, TracingObserver};

pub struct GenerationJob {
    generator: Arc<dyn PhraseGenerator>,
    store: Arc<dyn PhraseStore>,
    options: RetryOptions<PhraseError>,
    prompt: String,
}

impl GenerationJob {
    pub fn new(generator: Arc<dyn PhraseGenerator>, store: Arc<dyn PhraseStore>) -> Self {
        Self {
            generator,
            store,
            options: Self::default_options(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    /// Retry options for generation: 5 attempts, 1s doubling to at most
    /// 10s, 15% jitter. An empty answer from the service is retried too.
    pub fn default_options() -> RetryOptions<PhraseError> {
        RetryOptions::default()
            .with_max_attempts(5)
            .with_initial_delay(Duration::from_millis(1000))
            .with_max_delay(Duration::from_millis(10_000))
            .with_backoff_multiplier(2.0)
            .with_jitter_factor(0.15)
            .with_predicate(is_retryable_generation_error)
            .with_observer(TracingObserver::new("phrase-generation"))
    }

    pub fn with_options(mut self, options: RetryOptions<PhraseError>) -> Self {
        self.options = options;
        self
    }

    pub fn with_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn options(&self) -> &RetryOptions<PhraseError> {
        &self.options
    }

    /// A single generate, parse, store pass without retries.
    pub async fn generate_once(&self) -> Result<Phrase> {
        let text = self
            .generator
            .generate(&self.prompt)
            .await?
            .ok_or(PhraseError::EmptyResponse)?;

        let phrase: Phrase = parser::parse_as(&text, REQUIRED_FIELDS)?;
        phrase.validate()?;
        if !phrase.is_known_category() {
            debug!(category = %phrase.category, "Storing phrase with unlisted category");
        }

        self.store.insert(&phrase).await?;
        Ok(phrase)
    }

    /// Run the job with retries and summarize the outcome.
    pub async fn run(&self) -> JobReport {
        let result = with_exponential_backoff(|| self.generate_once(), &self.options).await;
        let total_time_ms = result.total_time_ms();
        let attempts = result.attempts;

        match result.outcome {
            Ok(phrase) => {
                info!(
                    attempts,
                    total_time_ms,
                    category = %phrase.category,
                    "Phrase generated and stored"
                );
                JobReport {
                    success: true,
                    message: "Inserted one phrase successfully".to_string(),
                    attempts,
                    total_time_ms,
                    phrase: Some(phrase),
                }
            }
            Err(err) => {
                error!(attempts, total_time_ms, error = %err, "Phrase generation failed");
                JobReport {
                    success: false,
                    message: format!("Failed to generate phrase: {}", err),
                    attempts,
                    total_time_ms,
                    phrase: None,
                }
            }
        }
    }

    /// Like `run`, but a failed run becomes an error.
    pub async fn run_checked(&self) -> Result<JobReport> {
        let report = self.run().await;
        if report.success {
            Ok(report)
        } else {
            Err(PhraseError::GenerationFailed {
                attempts: report.attempts,
                message: report.message,
            })
        }
    }
}

/// Default classification, plus empty answers from the service.
pub fn is_retryable_generation_error(error: &PhraseError) -> bool {
    matches!(error, PhraseError::EmptyResponse) || is_retryable_error(error)
}
