//! HTTP transport implementation.
//!
//! This module provides an HTTP-based transport for the sync manager.
//! The actual HTTP client is abstracted via a trait so callers can plug in
//! whichever library they already ship (reqwest, ureq, a platform webview
//! bridge) without this crate pinning one.

use crate::error::{SyncError, SyncResult};
use crate::transport::{PushOutcome, UpdateTransport};
use parking_lot::RwLock;
use shopsync_store::{FieldMap, OwnerId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Endpoint paths relative to the base URL.
const UPDATE_ENDPOINT: &str = "/profile/update";
const FETCH_ENDPOINT: &str = "/profile";

/// Response from an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// plain strings; the transport classifies them as retryable. The timeout
/// comes from the sync configuration and bounds each request, so a hung
/// server cannot stall a sync pass indefinitely.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body.
    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, String>;

    /// Sends a GET request.
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, String>;
}

/// HTTP-based update transport.
///
/// Pushes go to `<base>/profile/update` as JSON; entity fetches come from
/// `<base>/profile?owner_id=<id>`. A 2xx status with no failure marker in
/// the body counts as acceptance; any other status or a transport error is
/// a failure.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the update endpoint (e.g. `https://store.example.com/api`).
    base_url: String,
    client: C,
    timeout: Duration,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            timeout,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn record_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_owned());
        self.connected.store(false, Ordering::SeqCst);
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
        self.connected.store(true, Ordering::SeqCst);
    }
}

/// Decides whether a 2xx response body confirms acceptance.
///
/// JSON bodies are checked for an explicit status/success field. Legacy
/// form-posting endpoints reply with HTML; an error marker in the text is
/// treated as rejection, anything else as acceptance.
fn body_accepts(body: &[u8]) -> bool {
    if body.is_empty() {
        return true;
    }
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(status) = value.get("status").and_then(|v| v.as_str()) {
            return matches!(status, "success" | "ok");
        }
        if let Some(flag) = value.get("success").and_then(|v| v.as_bool()) {
            return flag;
        }
        return true;
    }
    let text = String::from_utf8_lossy(body).to_lowercase();
    text.contains("success") || !text.contains("error")
}

impl<C: HttpClient> UpdateTransport for HttpTransport<C> {
    fn push_update(&self, owner: &OwnerId, payload: &FieldMap) -> SyncResult<PushOutcome> {
        let mut body = serde_json::Map::new();
        body.insert("owner_id".into(), serde_json::Value::String(owner.0.clone()));
        body.insert(
            "fields".into(),
            serde_json::Value::Object(payload.clone()),
        );

        let url = format!("{}{}", self.base_url, UPDATE_ENDPOINT);
        let response = self
            .client
            .post_json(&url, &serde_json::Value::Object(body), self.timeout)
            .map_err(|e| {
                self.record_error(&e);
                SyncError::transport_retryable(e)
            })?;
        self.clear_error();

        if response.is_success() && body_accepts(&response.body) {
            Ok(PushOutcome::accepted())
        } else {
            Ok(PushOutcome::rejected(format!(
                "status {}",
                response.status
            )))
        }
    }

    fn fetch_entity(&self, owner: &OwnerId) -> SyncResult<Option<FieldMap>> {
        let url = format!("{}{}?owner_id={}", self.base_url, FETCH_ENDPOINT, owner.0);
        let response = self.client.get(&url, self.timeout).map_err(|e| {
            self.record_error(&e);
            SyncError::transport_retryable(e)
        })?;
        self.clear_error();

        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(SyncError::transport_retryable(format!(
                "entity fetch failed with status {}",
                response.status
            )));
        }

        let value: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Protocol(format!("entity body is not JSON: {e}")))?;
        match value {
            serde_json::Value::Object(map) => Ok(Some(map)),
            serde_json::Value::Null => Ok(None),
            other => Err(SyncError::Protocol(format!(
                "expected entity object, got {other}"
            ))),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Replays canned responses and records request URLs.
    struct CannedClient {
        responses: Mutex<Vec<Result<HttpResponse, String>>>,
        urls: Mutex<Vec<String>>,
    }

    impl CannedClient {
        fn new(responses: Vec<Result<HttpResponse, String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn next(&self, url: &str) -> Result<HttpResponse, String> {
            self.urls.lock().push(url.to_owned());
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Err("no canned response".into())
            } else {
                responses.remove(0)
            }
        }
    }

    impl HttpClient for CannedClient {
        fn post_json(
            &self,
            url: &str,
            _body: &serde_json::Value,
            _timeout: Duration,
        ) -> Result<HttpResponse, String> {
            self.next(url)
        }

        fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, String> {
            self.next(url)
        }
    }

    fn transport(responses: Vec<Result<HttpResponse, String>>) -> HttpTransport<CannedClient> {
        HttpTransport::new(
            "https://store.example.com/api",
            CannedClient::new(responses),
            Duration::from_secs(5),
        )
    }

    fn ok_response(body: &str) -> Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
        })
    }

    #[test]
    fn push_success_on_json_status() {
        let transport = transport(vec![ok_response(r#"{"status":"success"}"#)]);
        let outcome = transport
            .push_update(&OwnerId::new("u1"), &FieldMap::new())
            .unwrap();
        assert!(outcome.accepted);
    }

    #[test]
    fn push_rejected_on_json_error_status() {
        let transport = transport(vec![ok_response(r#"{"status":"error"}"#)]);
        let outcome = transport
            .push_update(&OwnerId::new("u1"), &FieldMap::new())
            .unwrap();
        assert!(!outcome.accepted);
    }

    #[test]
    fn push_rejected_on_http_failure_status() {
        let transport = transport(vec![Ok(HttpResponse {
            status: 500,
            body: Vec::new(),
        })]);
        let outcome = transport
            .push_update(&OwnerId::new("u1"), &FieldMap::new())
            .unwrap();
        assert!(!outcome.accepted);
    }

    #[test]
    fn push_transport_error_is_retryable() {
        let transport = transport(vec![Err("connection refused".into())]);
        let result = transport.push_update(&OwnerId::new("u1"), &FieldMap::new());

        match result {
            Err(err @ SyncError::Transport { .. }) => assert!(err.is_retryable()),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert!(!transport.is_connected());
        assert!(transport.last_error().is_some());
    }

    #[test]
    fn html_body_with_error_marker_is_rejected() {
        let transport = transport(vec![ok_response("<html>Error: update failed</html>")]);
        let outcome = transport
            .push_update(&OwnerId::new("u1"), &FieldMap::new())
            .unwrap();
        assert!(!outcome.accepted);
    }

    #[test]
    fn fetch_entity_parses_object() {
        let transport = transport(vec![ok_response(
            r#"{"name":"Alice","updated_at":"2024-01-02T00:00:00Z"}"#,
        )]);

        let entity = transport.fetch_entity(&OwnerId::new("u1")).unwrap().unwrap();
        assert_eq!(entity.get("name"), Some(&json!("Alice")));
    }

    #[test]
    fn fetch_entity_404_is_none() {
        let transport = transport(vec![Ok(HttpResponse {
            status: 404,
            body: Vec::new(),
        })]);
        assert!(transport.fetch_entity(&OwnerId::new("u1")).unwrap().is_none());
    }

    #[test]
    fn fetch_entity_builds_owner_url() {
        let transport = transport(vec![ok_response("{}")]);
        transport.fetch_entity(&OwnerId::new("u42")).unwrap();

        let urls = transport.client.urls.lock().clone();
        assert_eq!(
            urls,
            vec!["https://store.example.com/api/profile?owner_id=u42".to_owned()]
        );
    }

    #[test]
    fn connection_recovers_after_success() {
        let transport = transport(vec![Err("reset".into()), ok_response("{}")]);
        let owner = OwnerId::new("u1");

        assert!(transport.fetch_entity(&owner).is_err());
        assert!(!transport.is_connected());

        assert!(transport.fetch_entity(&owner).is_ok());
        assert!(transport.is_connected());
        assert!(transport.last_error().is_none());
    }
}
