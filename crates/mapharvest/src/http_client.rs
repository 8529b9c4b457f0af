//! Async HTTP client wrapping reqwest.
//!
//! Plain GET-as-text, one request at a time. Failures are returned to the
//! caller as-is; nothing is retried.

use std::time::Duration;

use crate::error::{HarvestError, HarvestResult};

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// Response body as text.
    pub body: String,
}

/// HTTP client used to pull resource bodies and map payloads.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a new HTTP client with a standard Chrome user-agent.
    pub fn new(timeout: Duration) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// GET `url` and return its body as text.
    ///
    /// Non-2xx statuses are errors.
    pub async fn get_text(&self, url: &str) -> HarvestResult<HttpResponse> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = resp.url().to_string();
        if final_url != url {
            tracing::debug!(url = %url, final_url = %final_url, "followed redirect");
        }

        let body = resp.text().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(HttpResponse { final_url, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_text_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app.js"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("let a = 1;", "application/javascript"),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5));
        let url = format!("{}/app.js", server.uri());
        let resp = client.get_text(&url).await.unwrap();

        assert_eq!(resp.body, "let a = 1;");
        assert_eq!(resp.final_url, url);
    }

    #[tokio::test]
    async fn test_get_text_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old.js.map"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "/maps/new.js.map"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/maps/new.js.map"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5));
        let resp = client
            .get_text(&format!("{}/old.js.map", server.uri()))
            .await
            .unwrap();

        assert_eq!(resp.body, "{}");
        assert_eq!(resp.final_url, format!("{}/maps/new.js.map", server.uri()));
    }

    #[tokio::test]
    async fn test_get_text_fails_on_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.js"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5));
        let err = client
            .get_text(&format!("{}/missing.js", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_get_text_does_not_retry_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.js"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Duration::from_secs(5));
        let result = client.get_text(&format!("{}/flaky.js", server.uri())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_text_connection_refused() {
        let client = HttpClient::new(Duration::from_secs(2));
        let err = client
            .get_text("http://127.0.0.1:9/nothing.js")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Http { .. }));
    }
}
