use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;

use crate::error::{RemoteError, Result};

// ─── HttpClient ──────────────────────────────────────────────────────────────

/// Blocking client with uniform status handling. Requests are sent once.
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }

    /// Send the request built by `build`. 429 becomes [`RemoteError::RateLimit`],
    /// any other non-success status [`RemoteError::Api`].
    pub fn send(&self, url: &str, build: impl FnOnce(&Client) -> RequestBuilder) -> Result<Response> {
        let response = build(&self.client).send()?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(RemoteError::RateLimit(url.to_string(), wait));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::debug!(url, status = status.as_u16(), "request failed");
            return Err(RemoteError::Api { url: url.to_string(), status: status.as_u16(), body });
        }
        Ok(response)
    }

    pub fn get(&self, url: &str) -> Result<Response> {
        self.send(url, |client| client.get(url))
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get(url)?.text()?;
        serde_json::from_str(&text).map_err(|e| RemoteError::Parse(format!("{url}: {e}")))
    }

    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.get(url)?.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpClient {
        HttpClient::new("gitrefer-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn error_status_carries_body() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/missing").with_status(404).with_body("gone").create();

        let url = format!("{}/missing", server.url());
        match client().get(&url) {
            Err(RemoteError::Api { status, body, .. }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "gone");
            }
            other => panic!("unexpected: {other:?}"),
        }
        mock.assert();
    }

    #[test]
    fn rate_limit_reports_retry_after() {
        let mut server = mockito::Server::new();
        let limited = server
            .mock("GET", "/busy")
            .with_status(429)
            .with_header("retry-after", "12")
            .expect(1)
            .create();

        let url = format!("{}/busy", server.url());
        assert!(matches!(client().get(&url), Err(RemoteError::RateLimit(_, 12))));
        limited.assert();
    }

    #[test]
    fn json_body_is_decoded() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/ok").with_body(r#"{"n": 3}"#).create();

        let url = format!("{}/ok", server.url());
        let value: serde_json::Value = client().get_json(&url).unwrap();
        assert_eq!(value["n"], 3);
    }
}
