//! Crisp REST client and the page sources built on it.
//!
//! Every endpoint answer is classified into a `PageResult` here, at
//! the edge. The driver upstream never handles a status code or a
//! transport error type; it only sees the classified outcome.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{RawRecord, RecordKind};
use crate::sync::{CursorHint, CursorValue, PageResult, PageSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated HTTP client bound to one workspace.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    site_id: String,
    identifier: String,
    key: String,
}

/// Crisp wraps every payload in `{error, reason, data}`; only `data`
/// matters here.
#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Value>,
}

/// Classified response before endpoint-specific interpretation.
enum Fetched {
    Data(Value),
    RateLimited { retry_after: Option<Duration> },
    Transient(String),
    Malformed(String),
}

impl Fetched {
    /// Map onto a `PageResult`, delegating only the data case.
    fn into_page_result(self, on_data: impl FnOnce(Value) -> PageResult) -> PageResult {
        match self {
            Self::Data(data) => on_data(data),
            Self::RateLimited { retry_after } => PageResult::RateLimited { retry_after },
            Self::Transient(detail) => PageResult::Transient(detail),
            Self::Malformed(detail) => PageResult::Malformed(detail),
        }
    }
}

impl ApiClient {
    /// Build a client from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("X-Crisp-Tier", HeaderValue::from_static("plugin"));

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            site_id: config.site_id.clone(),
            identifier: config.identifier.clone(),
            key: config.key.clone(),
        })
    }

    /// Source over the workspace conversation list.
    #[must_use]
    pub const fn conversations(&self) -> ConversationSource<'_> {
        ConversationSource { client: self }
    }

    /// Source over one conversation's message history.
    #[must_use]
    pub const fn messages<'a>(&'a self, conversation_id: &'a str) -> MessageSource<'a> {
        MessageSource {
            client: self,
            conversation_id,
        }
    }

    /// Fetch one user profile, classified like a single-record page.
    pub async fn fetch_profile(&self, email: &str) -> PageResult {
        let url = format!(
            "{}/website/{}/people/profile/{}",
            self.base_url, self.site_id, email
        );
        self.fetch_data(&url, &[]).await.into_page_result(|data| match data {
            Value::Object(_) => PageResult::Records {
                records: vec![RawRecord::new(data)],
                hint: CursorHint::Count(1),
            },
            Value::Null => PageResult::Malformed("profile payload missing data".to_string()),
            _ => PageResult::Malformed("profile payload is not an object".to_string()),
        })
    }

    /// GET a wrapped endpoint and classify the response.
    async fn fetch_data(&self, url: &str, query: &[(&str, String)]) -> Fetched {
        debug!(url, "GET");
        let request = self
            .http
            .get(url)
            .basic_auth(&self.identifier, Some(&self.key))
            .query(query);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Fetched::Transient(format!("request failed: {e}")),
        };

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::PARTIAL_CONTENT {
            return match response.json::<Envelope>().await {
                Ok(envelope) => Fetched::Data(envelope.data.unwrap_or(Value::Null)),
                Err(e) => Fetched::Malformed(format!("undecodable body: {e}")),
            };
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Fetched::RateLimited { retry_after };
        }
        if status.is_server_error() {
            return Fetched::Transient(format!("server error {status}"));
        }

        let body = response.text().await.unwrap_or_default();
        Fetched::Malformed(format!(
            "unexpected status {status}: {}",
            truncate(&body, 200)
        ))
    }
}

/// Offset-paginated conversation list.
pub struct ConversationSource<'a> {
    client: &'a ApiClient,
}

impl PageSource for ConversationSource<'_> {
    async fn fetch_page(&self, cursor: &CursorValue, page_size: usize) -> PageResult {
        let CursorValue::Offset(offset) = cursor else {
            return PageResult::Malformed(
                "conversation pagination needs an offset cursor".to_string(),
            );
        };
        let url = format!(
            "{}/website/{}/conversations/",
            self.client.base_url, self.client.site_id
        );
        let query = [
            ("limit", page_size.to_string()),
            ("offset", offset.to_string()),
        ];
        self.client
            .fetch_data(&url, &query)
            .await
            .into_page_result(|data| match into_records(data) {
                Ok(records) if records.is_empty() => PageResult::Exhausted,
                Ok(records) => {
                    let hint = CursorHint::Count(records.len());
                    PageResult::Records { records, hint }
                }
                Err(detail) => PageResult::Malformed(detail),
            })
    }
}

/// Message history walked newest to oldest via `timestamp_before`.
///
/// The endpoint serves fixed-size pages, so the requested page size is
/// not forwarded.
pub struct MessageSource<'a> {
    client: &'a ApiClient,
    conversation_id: &'a str,
}

impl PageSource for MessageSource<'_> {
    async fn fetch_page(&self, cursor: &CursorValue, _page_size: usize) -> PageResult {
        let CursorValue::Boundary(bound) = cursor else {
            return PageResult::Malformed(
                "message pagination needs a boundary cursor".to_string(),
            );
        };
        let url = format!(
            "{}/website/{}/conversation/{}/messages/",
            self.client.base_url, self.client.site_id, self.conversation_id
        );
        let mut query = Vec::new();
        if let Some(before) = bound {
            query.push(("timestamp_before", before.to_string()));
        }
        self.client
            .fetch_data(&url, &query)
            .await
            .into_page_result(|data| match into_records(data) {
                Ok(records) if records.is_empty() => PageResult::Exhausted,
                Ok(records) => {
                    let oldest = records
                        .iter()
                        .map(|record| RecordKind::Message.recency(record))
                        .min()
                        .unwrap_or(0);
                    PageResult::Records {
                        records,
                        hint: CursorHint::Oldest(oldest),
                    }
                }
                Err(detail) => PageResult::Malformed(detail),
            })
    }
}

/// A list endpoint's `data` must be an array; `null` means empty.
fn into_records(data: Value) -> std::result::Result<Vec<RawRecord>, String> {
    match data {
        Value::Array(items) => Ok(items.into_iter().map(RawRecord::new).collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(format!(
            "expected a list, got: {}",
            truncate(&other.to_string(), 80)
        )),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataDir;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> ApiClient {
        let config = Config {
            identifier: "id_test".to_string(),
            key: "key_test".to_string(),
            site_id: "site_1".to_string(),
            base_url: server.url(),
            data: DataDir::new("/tmp/chatmirror-tests"),
        };
        ApiClient::new(&config).unwrap()
    }

    fn envelope(data: Value) -> String {
        json!({"error": false, "reason": "listed", "data": data}).to_string()
    }

    #[tokio::test]
    async fn conversation_pages_carry_auth_and_pagination_params() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "2".into()),
                Matcher::UrlEncoded("offset".into(), "40".into()),
            ]))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_header("x-crisp-tier", "plugin")
            .with_status(206)
            .with_body(envelope(json!([
                {"session_id": "s_1", "active": {"last": 200}},
                {"session_id": "s_2", "active": {"last": 100}},
            ])))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(40), 2)
            .await;

        mock.assert_async().await;
        match result {
            PageResult::Records { records, hint } => {
                assert_eq!(records.len(), 2);
                assert_eq!(hint, CursorHint::Count(2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_and_null_data_mean_exhausted() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(envelope(json!([])))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        assert!(matches!(result, PageResult::Exhausted));

        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"error": false, "reason": "listed", "data": null}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        assert!(matches!(result, PageResult::Exhausted));
    }

    #[tokio::test]
    async fn throttling_carries_the_retry_after_header() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "60")
            .with_body("{\"error\": true, \"reason\": \"quota_limit_exceeded\"}")
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        match result {
            PageResult::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(60)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_classify_as_transient() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        assert!(matches!(result, PageResult::Transient(_)));
    }

    #[tokio::test]
    async fn unexpected_statuses_classify_as_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("{\"error\": true, \"reason\": \"website_not_found\"}")
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        match result {
            PageResult::Malformed(detail) => assert!(detail.contains("404")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_success_bodies_classify_as_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>definitely not json</html>")
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        assert!(matches!(result, PageResult::Malformed(_)));
    }

    #[tokio::test]
    async fn message_pages_bound_by_timestamp_and_report_the_oldest() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/website/site_1/conversation/s_9/messages/")
            .match_query(Matcher::UrlEncoded(
                "timestamp_before".into(),
                "1700000400".into(),
            ))
            .with_status(200)
            .with_body(envelope(json!([
                {"fingerprint": "f_1", "timestamp": 1_700_000_300u64},
                {"fingerprint": "f_2", "timestamp": 1_700_000_100u64},
            ])))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .messages("s_9")
            .fetch_page(&CursorValue::Boundary(Some(1_700_000_400)), 50)
            .await;

        mock.assert_async().await;
        match result {
            PageResult::Records { records, hint } => {
                assert_eq!(records.len(), 2);
                assert_eq!(hint, CursorHint::Oldest(1_700_000_100));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_message_page_sends_no_bound() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/website/site_1/conversation/s_9/messages/")
            .match_query(Matcher::Missing)
            .with_status(200)
            .with_body(envelope(json!([{"fingerprint": "f_1", "timestamp": 100}])))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .messages("s_9")
            .fetch_page(&CursorValue::Boundary(None), 50)
            .await;

        mock.assert_async().await;
        assert!(matches!(result, PageResult::Records { .. }));
    }

    #[tokio::test]
    async fn profiles_unwrap_the_data_object() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/people/profile/ada@example.com")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(envelope(json!({
                "email": "ada@example.com",
                "person": {"nickname": "Ada"},
            })))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client.fetch_profile("ada@example.com").await;
        match result {
            PageResult::Records { records, .. } => {
                assert_eq!(records.len(), 1);
                assert_eq!(
                    records[0].probe_string(&["person", "nickname"]).as_deref(),
                    Some("Ada")
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_list_data_on_list_endpoints_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/website/site_1/conversations/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(envelope(json!({"unexpected": "object"})))
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .conversations()
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        match result {
            PageResult::Malformed(detail) => assert!(detail.contains("expected a list")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_cursor_styles_are_rejected_client_side() {
        let server = Server::new_async().await;
        let client = client_for(&server);

        let result = client
            .conversations()
            .fetch_page(&CursorValue::Boundary(None), 50)
            .await;
        assert!(matches!(result, PageResult::Malformed(_)));

        let result = client
            .messages("s_1")
            .fetch_page(&CursorValue::Offset(0), 50)
            .await;
        assert!(matches!(result, PageResult::Malformed(_)));
    }
}
