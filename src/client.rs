//! Remote match client for the Loki bulk intent-matching endpoint.
//!
//! One call is one HTTPS POST. Every failure mode, transport, non-2xx
//! status, unparsable body, or a service-level rejection, comes back as a
//! [`MatchResponse`] with `accepted == false` and a descriptive message;
//! the public call surface never returns an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Account, Settings};

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Bulk API request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct BulkRequest {
    /// Account username.
    pub username: String,
    /// Input items, at most the per-request limit.
    pub input_list: Vec<String>,
    /// Account API key.
    pub loki_key: String,
    /// Intents to match against; empty means all known intents.
    pub filter_list: Vec<String>,
}

/// Bulk API response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct BulkResponse {
    /// Service-level success flag.
    pub status: bool,
    /// Service-level message.
    pub msg: String,
    /// Engine version, present on success.
    pub version: Option<String>,
    /// Remaining word quota, if the service reports one.
    pub word_count_balance: Option<i64>,
    /// One entry per input item, same order.
    pub result_list: Option<Vec<BulkItem>>,
}

/// Per-input-item result in the response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct BulkItem {
    /// Whether this item matched at least one intent.
    pub status: bool,
    /// Per-item message.
    pub msg: String,
    /// Matches for this item, present only on success.
    pub results: Option<Vec<BulkMatch>>,
}

/// One intent match in the response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct BulkMatch {
    /// Matched intent name.
    pub intent: String,
    /// Pattern that produced the match.
    pub pattern: String,
    /// Matched utterance substring.
    pub utterance: String,
    /// Captured slot values, positionally ordered.
    pub argument: Vec<String>,
}

// ---------------------------------------------------------------------------
// Errors (internal; the call surface converts these to failure responses)
// ---------------------------------------------------------------------------

/// Errors raised while performing one bulk call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport failure.
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    /// Remote service responded with a non-success status code.
    #[error("{status} Connection failed.")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },
    /// Response body did not match the expected schema.
    #[error("{0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Domain result
// ---------------------------------------------------------------------------

/// One intent match for one input item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentMatch {
    /// Matched intent name.
    pub intent: String,
    /// Pattern that produced the match.
    pub pattern: String,
    /// Matched utterance substring.
    pub utterance: String,
    /// Captured slot values, positionally ordered.
    pub arguments: Vec<String>,
}

/// Result for one input item of a bulk call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    /// Whether this item matched at least one intent.
    pub accepted: bool,
    /// Per-item message from the service.
    pub message: String,
    /// Matches for this item, empty unless accepted.
    pub matches: Vec<IntentMatch>,
}

/// Outcome of one bulk call, success or failure.
///
/// Out-of-range indexed access returns neutral defaults (`false`, `""`,
/// `0`, `[]`) rather than panicking, so callers can probe the structure
/// without bounds bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResponse {
    /// Whether the call succeeded end to end.
    pub accepted: bool,
    /// Success or failure description from the service or the transport.
    pub message: String,
    /// Engine version, empty on failure.
    pub version: String,
    /// Remaining word quota, `-1` when unknown.
    pub remaining_quota: i64,
    /// One entry per input item, same order; empty on failure.
    pub items: Vec<ItemResult>,
}

impl Default for MatchResponse {
    fn default() -> Self {
        Self {
            accepted: false,
            message: String::new(),
            version: String::new(),
            remaining_quota: -1,
            items: Vec::new(),
        }
    }
}

impl MatchResponse {
    /// Build a failure response carrying only a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Whether the item at `index` matched at least one intent.
    pub fn item_accepted(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(|item| item.accepted)
    }

    /// The per-item message at `index`.
    pub fn item_message(&self, index: usize) -> &str {
        self.items.get(index).map_or("", |item| item.message.as_str())
    }

    /// Number of matches for the item at `index`; zero when the item was
    /// rejected or out of range.
    pub fn match_count(&self, index: usize) -> usize {
        self.items
            .get(index)
            .filter(|item| item.accepted)
            .map_or(0, |item| item.matches.len())
    }

    /// The match at `(index, match_index)`, if both are in range and the
    /// item was accepted.
    pub fn get_match(&self, index: usize, match_index: usize) -> Option<&IntentMatch> {
        if match_index < self.match_count(index) {
            self.items.get(index)?.matches.get(match_index)
        } else {
            None
        }
    }

    /// The matched intent name at `(index, match_index)`.
    pub fn intent(&self, index: usize, match_index: usize) -> &str {
        self.get_match(index, match_index)
            .map_or("", |m| m.intent.as_str())
    }

    /// The matching pattern at `(index, match_index)`.
    pub fn pattern(&self, index: usize, match_index: usize) -> &str {
        self.get_match(index, match_index)
            .map_or("", |m| m.pattern.as_str())
    }

    /// The matched utterance at `(index, match_index)`.
    pub fn utterance(&self, index: usize, match_index: usize) -> &str {
        self.get_match(index, match_index)
            .map_or("", |m| m.utterance.as_str())
    }

    /// The captured arguments at `(index, match_index)`.
    pub fn arguments(&self, index: usize, match_index: usize) -> &[String] {
        self.get_match(index, match_index)
            .map_or(&[], |m| m.arguments.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a bulk API request body.
#[doc(hidden)]
pub fn build_request(account: &Account, input_batch: &[String], filter: &[String]) -> BulkRequest {
    BulkRequest {
        username: account.username.clone(),
        input_list: input_batch.to_vec(),
        loki_key: account.loki_key.clone(),
        filter_list: filter.to_vec(),
    }
}

/// Parse a bulk API response body into a [`MatchResponse`].
///
/// A service-level rejection (`status: false`) parses successfully into a
/// failure response; only an unreadable body is an error.
///
/// # Errors
///
/// Returns `ClientError::Parse` if the body cannot be deserialized.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<MatchResponse, ClientError> {
    let resp: BulkResponse =
        serde_json::from_str(body).map_err(|e| ClientError::Parse(e.to_string()))?;

    if !resp.status {
        return Ok(MatchResponse::failure(resp.msg));
    }

    let items = resp
        .result_list
        .unwrap_or_default()
        .into_iter()
        .map(|item| ItemResult {
            accepted: item.status,
            message: item.msg,
            matches: item
                .results
                .unwrap_or_default()
                .into_iter()
                .map(|m| IntentMatch {
                    intent: m.intent,
                    pattern: m.pattern,
                    utterance: m.utterance,
                    arguments: m.argument,
                })
                .collect(),
        })
        .collect();

    Ok(MatchResponse {
        accepted: true,
        message: resp.msg,
        version: resp.version.unwrap_or_default(),
        remaining_quota: resp.word_count_balance.unwrap_or(-1),
        items,
    })
}

// ---------------------------------------------------------------------------
// Service seam
// ---------------------------------------------------------------------------

/// One bulk request/response cycle against the matching service.
///
/// The trait is the seam between the batch orchestrator and the network:
/// tests substitute a scripted in-memory implementation. Implementations
/// must capture every failure as a response rather than returning an error.
#[async_trait]
pub trait MatchService: Send + Sync {
    /// Match a batch of input items, restricted to `filter` when non-empty.
    ///
    /// `input_batch` must already respect the per-request limit; the caller
    /// enforces it.
    async fn match_batch(&self, input_batch: &[String], filter: &[String]) -> MatchResponse;
}

/// HTTP client for the Loki bulk endpoint.
#[derive(Debug, Clone)]
pub struct LokiClient {
    endpoint: String,
    account: Account,
    default_filter: Vec<String>,
    client: reqwest::Client,
}

impl LokiClient {
    /// Create a client from loaded settings and account credentials.
    pub fn new(settings: &Settings, account: Account) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            account,
            default_filter: settings.intent_filter.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, request: &BulkRequest) -> Result<MatchResponse, ClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        parse_response(&body)
    }
}

#[async_trait]
impl MatchService for LokiClient {
    async fn match_batch(&self, input_batch: &[String], filter: &[String]) -> MatchResponse {
        // An empty call-site filter falls back to the configured default.
        let filter = if filter.is_empty() {
            self.default_filter.as_slice()
        } else {
            filter
        };
        let request = build_request(&self.account, input_batch, filter);
        debug!(
            items = input_batch.len(),
            filtered = !filter.is_empty(),
            "sending bulk match request"
        );
        match self.post(&request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "bulk match request failed");
                MatchResponse::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatchResponse {
        MatchResponse {
            accepted: true,
            message: "Success!".to_owned(),
            version: "v223".to_owned(),
            remaining_quota: 2000,
            items: vec![
                ItemResult {
                    accepted: true,
                    message: "Success!".to_owned(),
                    matches: vec![IntentMatch {
                        intent: "weather".to_owned(),
                        pattern: "[天氣]".to_owned(),
                        utterance: "今天天氣".to_owned(),
                        arguments: vec!["今天".to_owned()],
                    }],
                },
                ItemResult {
                    accepted: false,
                    message: "No matching Intent.".to_owned(),
                    matches: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn accessors_in_range() {
        let resp = sample();
        assert!(resp.item_accepted(0));
        assert_eq!(resp.match_count(0), 1);
        assert_eq!(resp.intent(0, 0), "weather");
        assert_eq!(resp.pattern(0, 0), "[天氣]");
        assert_eq!(resp.utterance(0, 0), "今天天氣");
        assert_eq!(resp.arguments(0, 0), ["今天".to_owned()]);
    }

    #[test]
    fn rejected_item_reports_no_matches() {
        let resp = sample();
        assert!(!resp.item_accepted(1));
        assert_eq!(resp.item_message(1), "No matching Intent.");
        assert_eq!(resp.match_count(1), 0);
        assert!(resp.get_match(1, 0).is_none());
    }

    #[test]
    fn accessors_out_of_range_default() {
        let resp = sample();
        assert!(!resp.item_accepted(9));
        assert_eq!(resp.item_message(9), "");
        assert_eq!(resp.match_count(9), 0);
        assert_eq!(resp.intent(0, 9), "");
        assert_eq!(resp.pattern(9, 0), "");
        assert_eq!(resp.utterance(9, 9), "");
        assert!(resp.arguments(9, 9).is_empty());
        assert!(resp.get_match(9, 0).is_none());
    }

    #[test]
    fn failure_carries_message_only() {
        let resp = MatchResponse::failure("401 Connection failed.");
        assert!(!resp.accepted);
        assert_eq!(resp.message, "401 Connection failed.");
        assert_eq!(resp.version, "");
        assert_eq!(resp.remaining_quota, -1);
        assert!(resp.items.is_empty());
    }

    #[test]
    fn http_status_error_message_embeds_code() {
        let e = ClientError::HttpStatus { status: 503 };
        assert_eq!(e.to_string(), "503 Connection failed.");
    }
}
