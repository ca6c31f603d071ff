//! Full-text fetch capability client (spec §4.4, §6).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};

use crate::clients::retry_send::send_json;
use crate::clients::types::{FetchMethod, FetchResponse};
use crate::util::retry::RetryConfig;

pub(crate) struct FetchClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
}

impl FetchClient {
    pub(crate) fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build().context("failed to build fetch client")?,
            base_url: Url::parse(base_url).context("invalid fetch capability base URL")?,
            token,
            timeout,
            retry,
        })
    }

    async fn fetch(&self, mode: &str, url: &str) -> Result<String> {
        let endpoint = self
            .base_url
            .join(&format!("v1/fetch/{mode}"))
            .context("failed to build fetch URL")?;

        let response = send_json::<_, FetchResponse>(
            || {
                let mut builder = self
                    .client
                    .post(endpoint.clone())
                    .json(&serde_json::json!({ "url": url }))
                    .timeout(self.timeout);
                if let Some(token) = &self.token {
                    builder = builder.bearer_auth(token);
                }
                builder
            },
            self.retry,
        )
        .await?;

        Ok(response.text)
    }

    /// Resolves full text for `url`, trying the primary provider first and
    /// falling back when it fails or returns text shorter than
    /// `min_text_chars` (spec §4.4). Returns `None` when neither provider
    /// produced usable text.
    pub(crate) async fn resolve(
        &self,
        url: &str,
        min_text_chars: usize,
    ) -> (Option<String>, FetchMethod) {
        if let Ok(text) = self.fetch("primary", url).await {
            if text.chars().count() >= min_text_chars {
                return (Some(text), FetchMethod::Primary);
            }
        }
        match self.fetch("fallback", url).await {
            Ok(text) if text.chars().count() >= min_text_chars => (Some(text), FetchMethod::Fallback),
            Ok(text) => (Some(text), FetchMethod::Fallback),
            Err(_) => (None, FetchMethod::Fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> FetchClient {
        FetchClient::new(&base_url, None, Duration::from_secs(5), RetryConfig::new(2, 1, 10)).unwrap()
    }

    #[tokio::test]
    async fn uses_primary_when_long_enough() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/fetch/primary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "x".repeat(500),
                "method": "primary",
                "content_type": "text/html"
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let (text, method) = client.resolve("https://example.com/a", 400).await;
        assert_eq!(text.unwrap().len(), 500);
        assert_eq!(method, FetchMethod::Primary);
    }

    #[tokio::test]
    async fn falls_back_when_primary_text_too_short() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/fetch/primary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "short",
                "method": "primary",
                "content_type": "text/html"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/fetch/fallback"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "y".repeat(500),
                "method": "fallback",
                "content_type": "text/plain"
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let (text, method) = client.resolve("https://example.com/a", 400).await;
        assert_eq!(text.unwrap().len(), 500);
        assert_eq!(method, FetchMethod::Fallback);
    }
}
