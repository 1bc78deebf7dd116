use crate::error::{PhraseError, Result};
use crate::utils::retry::RetryableError;
use reqwest::Client;
use std::time::Duration;

/// Configuration for HTTP client with proper timeouts
pub struct NetworkConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: format!("dailyphrase/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Create a properly configured HTTP client with timeouts
pub fn create_http_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| PhraseError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Map a transport failure from reqwest into a classified error.
///
/// The messages keep the tokens the default retry predicate looks for,
/// so a timed out or refused request is retried.
pub fn classify_network_error(error: &reqwest::Error, service: &str) -> PhraseError {
    if error.is_timeout() {
        return PhraseError::timeout(format!(
            "Request to {} timed out: {}",
            service, error
        ));
    }

    if error.is_connect() {
        return PhraseError::network(format!(
            "fetch failed: unable to connect to {}: {}",
            service, error
        ));
    }

    if let Some(status) = error.status() {
        return PhraseError::generation(status.as_u16(), error.to_string());
    }

    if error.is_decode() {
        return PhraseError::malformed(error.to_string(), "");
    }

    PhraseError::network(format!(
        "fetch failed: network error talking to {}: {}",
        service, error
    ))
}

const TRANSPORT_TOKENS: &[&str] = &["fetch", "network", "timeout"];

const TRANSIENT_TOKENS: &[&str] = &[
    "rate limit",
    "503",
    "429",
    "500",
    "502",
    "timeout",
    "deadline",
];

/// Default retry predicate.
///
/// Transport errors are retryable when the message mentions fetch, network
/// or timeout. Any error is retryable when the message mentions rate
/// limiting, a 429/500/502/503 status, a timeout or a deadline. Everything
/// else is terminal.
pub fn is_retryable_error<E: RetryableError + ?Sized>(error: &E) -> bool {
    let msg_lower = error.to_string().to_lowercase();

    if error.is_transport()
        && TRANSPORT_TOKENS
            .iter()
            .any(|&token| msg_lower.contains(token))
    {
        return true;
    }

    TRANSIENT_TOKENS
        .iter()
        .any(|&token| msg_lower.contains(token))
}
