use std::time::Duration;

use async_trait::async_trait;
use domain_vector::SearchResponse;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::SearchPort;
use crate::error::SearchPortError;
use crate::models::SearchMatch;

/// Default location of the search API.
pub const DEFAULT_SEARCH_API_URL: &str = "http://127.0.0.1:8000";

/// Search port backed by the `/search/vector` HTTP API
pub struct HttpSearchPort {
    client: Client,
    base_url: String,
}

impl HttpSearchPort {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SearchPortError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchPortError::Rejected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn transport_error(err: reqwest::Error) -> SearchPortError {
    if err.is_connect() || err.is_timeout() {
        SearchPortError::ServiceUnavailable(err.to_string())
    } else {
        SearchPortError::Rejected(err.to_string())
    }
}

fn status_error(status: StatusCode, body: String) -> SearchPortError {
    let message = format!("HTTP {}: {}", status, body);
    if status == StatusCode::SERVICE_UNAVAILABLE {
        SearchPortError::ServiceUnavailable(message)
    } else {
        SearchPortError::Rejected(message)
    }
}

#[async_trait]
impl SearchPort for HttpSearchPort {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchMatch>, SearchPortError> {
        let response = self
            .client
            .get(format!("{}/search/vector", self.base_url))
            .query(&[("query", query), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, body));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| SearchPortError::MalformedResponse(e.to_string()))?;

        debug!(hits = parsed.results.len(), "Search API answered");
        Ok(parsed.results.into_iter().map(SearchMatch::from).collect())
    }

    async fn health_check(&self) -> Result<(), SearchPortError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn port(url: String) -> HttpSearchPort {
        HttpSearchPort::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_search_decodes_results() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search/vector")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "flood".into()),
                Matcher::UrlEncoded("limit".into(), "40000".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":[
                    {"time":"t1","location":"Easton","account":"u1","message":"water rising","label":"flood","score":0.91},
                    {"time":"t2","location":"Weston","account":"u2","message":"creek over road","label":"flood","score":0.5}
                ],"query":"flood","total_results":2}"#,
            )
            .create_async()
            .await;

        let matches = port(server.url()).search("flood", 40_000).await.unwrap();

        mock.assert_async().await;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0], SearchMatch::new("t1", "u1", "Easton", "water rising", 0.91));
        assert_eq!(matches[1].identity.account, "u2");
    }

    #[tokio::test]
    async fn test_503_is_unavailable() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/search/vector")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body(r#"{"detail":"Vector search service is currently unavailable. Please try again later."}"#)
            .create_async()
            .await;

        let err = port(server.url()).search("fire", 10).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_500_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/search/vector")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(r#"{"detail":"Search error: boom"}"#)
            .create_async()
            .await;

        let err = port(server.url()).search("fire", 10).await.unwrap_err();
        assert!(matches!(err, SearchPortError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/search/vector")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>proxy error</html>")
            .create_async()
            .await;

        let err = port(server.url()).search("fire", 10).await.unwrap_err();
        assert!(matches!(err, SearchPortError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // Nothing listens on the discard port.
        let err = port("http://127.0.0.1:9".to_string())
            .search("fire", 10)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;
        assert!(port(server.url()).health_check().await.is_ok());

        let mut down = Server::new_async().await;
        down.mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;
        assert!(port(down.url()).health_check().await.unwrap_err().is_unavailable());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let port = port("http://search:8000/".to_string());
        assert_eq!(port.base_url(), "http://search:8000");
    }
}
