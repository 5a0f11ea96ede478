//! Relay fetcher: GET a URL through an ordered list of CORS relays
//!
//! Each relay template is concatenated with the percent-encoded target URL.
//! The first relay to answer 2xx wins; errors and non-2xx responses fall
//! through to the next relay.

use crate::error::FetchError;
use clap::Args;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Public relays tried when none are configured
pub const DEFAULT_RELAYS: &[&str] = &[
    "https://api.allorigins.win/raw?url=",
    "https://corsproxy.io/?url=",
];

const USER_AGENT: &str = concat!("fontgrab/", env!("CARGO_PKG_VERSION"));

/// Configuration for relay fetching
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Relay URL templates, tried in order
    pub relays: Vec<String>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            timeout_ms: 15_000,
        }
    }
}

/// Relay options shared by every networked command
#[derive(Args, Debug, Clone)]
pub struct RelayArgs {
    /// Relay URL template, repeatable; the percent-encoded target is appended
    #[arg(long = "relay", value_name = "TEMPLATE", env = "FONTGRAB_RELAYS", value_delimiter = ',')]
    pub relays: Vec<String>,

    /// Timeout per request in milliseconds
    #[arg(long, default_value = "15000")]
    pub timeout: u64,
}

impl RelayArgs {
    pub fn to_config(&self) -> FetchConfig {
        let relays: Vec<String> = self
            .relays
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        FetchConfig {
            relays: if relays.is_empty() {
                FetchConfig::default().relays
            } else {
                relays
            },
            timeout_ms: self.timeout,
        }
    }
}

/// A successful response body
#[derive(Debug, Clone)]
pub struct RelayResponse {
    /// The URL that was actually requested (relay URL or direct URL)
    pub requested: String,
    pub body: Vec<u8>,
}

impl RelayResponse {
    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Why a single attempt failed
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
}

/// Run `operation` on each candidate in order and return the first success.
///
/// Returns every error, in order, if no candidate succeeds.
pub async fn try_in_order<C, T, E, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut operation: F,
) -> Result<T, Vec<E>>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut errors = Vec::new();
    for candidate in candidates {
        match operation(candidate).await {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }
    Err(errors)
}

/// HTTP fetcher that routes requests through relays
#[derive(Debug, Clone)]
pub struct ProxyFetcher {
    client: reqwest::Client,
    relays: Vec<String>,
}

impl ProxyFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            relays: config.relays.clone(),
        })
    }

    /// Build the relay request URL for a target
    pub fn relay_url(template: &str, target: &str) -> String {
        format!("{}{}", template, urlencoding::encode(target))
    }

    /// Fetch `target` through the first relay that answers 2xx
    pub async fn fetch(&self, target: &str) -> Result<RelayResponse, FetchError> {
        let result = try_in_order(self.relays.iter(), |relay| {
            let request_url = Self::relay_url(relay, target);
            async move {
                let outcome = self.get(&request_url).await;
                if let Err(e) = &outcome {
                    debug!(relay = %relay, url = %target, error = %e, "relay attempt failed");
                }
                outcome
            }
        })
        .await;

        result.map_err(|errors| FetchError::NetworkFailure {
            url: target.to_string(),
            attempts: errors.len(),
        })
    }

    /// Fetch `url` without a relay
    pub async fn fetch_direct(&self, url: &str) -> Result<RelayResponse, FetchError> {
        self.get(url).await.map_err(|e| {
            debug!(url, error = %e, "direct fetch failed");
            FetchError::NetworkFailure {
                url: url.to_string(),
                attempts: 1,
            }
        })
    }

    async fn get(&self, url: &str) -> Result<RelayResponse, AttemptError> {
        let response = self
            .client
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        debug!(url, status = status.as_u16(), len = body.len(), "fetched");

        Ok(RelayResponse {
            requested: url.to_string(),
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_url_encodes_target() {
        let url = ProxyFetcher::relay_url(
            "https://relay.test/raw?url=",
            "https://ex.com/a b?x=1&y=2",
        );
        assert_eq!(
            url,
            "https://relay.test/raw?url=https%3A%2F%2Fex.com%2Fa%20b%3Fx%3D1%26y%3D2"
        );
    }

    #[test]
    fn test_relay_args_fall_back_to_defaults() {
        let args = RelayArgs {
            relays: vec![" ".to_string()],
            timeout: 500,
        };
        let config = args.to_config();
        assert_eq!(config.relays.len(), DEFAULT_RELAYS.len());
        assert_eq!(config.timeout_ms, 500);

        let args = RelayArgs {
            relays: vec!["https://relay.test/?u=".to_string()],
            timeout: 500,
        };
        assert_eq!(args.to_config().relays, vec!["https://relay.test/?u="]);
    }

    #[test]
    fn test_default_config_has_two_relays() {
        let config = FetchConfig::default();
        assert_eq!(config.relays.len(), 2);
        assert!(config.timeout_ms > 0);
    }

    #[tokio::test]
    async fn test_try_in_order_first_success_wins() {
        let mut seen = Vec::new();
        let result: Result<u32, Vec<String>> = try_in_order([1u32, 2, 3], |n| {
            seen.push(n);
            async move {
                if n >= 2 {
                    Ok(n * 10)
                } else {
                    Err(format!("fail {}", n))
                }
            }
        })
        .await;
        assert_eq!(result, Ok(20));
        assert_eq!(seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_try_in_order_collects_all_errors() {
        let result: Result<(), Vec<u32>> = try_in_order([1u32, 2], |n| async move { Err(n) }).await;
        assert_eq!(result, Err(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_try_in_order_empty() {
        let result: Result<(), Vec<()>> =
            try_in_order(Vec::<u8>::new(), |_| async { Ok(()) }).await;
        assert_eq!(result, Err(vec![]));
    }
}
