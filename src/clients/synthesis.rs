//! Synthesis capability client (spec §4.6, §6) — turns the sources attached
//! to a cluster into the pro/simple article text pair.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};

use crate::clients::retry_send::send_json;
use crate::clients::types::{SourcePackage, SynthesisRequest, SynthesisResponse};
use crate::util::retry::RetryConfig;

pub(crate) struct SynthesisClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
}

impl SynthesisClient {
    pub(crate) fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build().context("failed to build synthesis client")?,
            base_url: Url::parse(base_url).context("invalid synthesis capability base URL")?,
            token,
            timeout,
            retry,
        })
    }

    pub(crate) async fn synthesize(
        &self,
        sources: &[SourcePackage<'_>],
    ) -> Result<SynthesisResponse> {
        let url = self
            .base_url
            .join("v1/synthesize")
            .context("failed to build synthesis URL")?;
        let request = SynthesisRequest { sources };

        send_json::<_, SynthesisResponse>(
            || {
                let mut builder = self.client.post(url.clone()).json(&request).timeout(self.timeout);
                if let Some(token) = &self.token {
                    builder = builder.bearer_auth(token);
                }
                builder
            },
            self.retry,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn synthesizes_from_sources() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/synthesize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "title_pro": "Central bank raises rates",
                "title_simple": "Interest rates go up",
                "bullets_pro": ["one", "two", "three"],
                "bullets_simple": ["one", "two", "three"],
                "body_pro": "x".repeat(800),
                "body_simple": "y".repeat(400),
            })))
            .mount(&server)
            .await;

        let client = SynthesisClient::new(
            &server.uri(),
            None,
            Duration::from_secs(5),
            RetryConfig::new(2, 1, 10),
        )
        .unwrap();

        let sources = vec![SourcePackage {
            publisher: "Reuters",
            title: "ECB raises rates",
            published_at: Utc::now(),
            text: "full article text",
        }];

        let response = client.synthesize(&sources).await.unwrap();
        assert_eq!(response.bullets_pro.len(), 3);
        assert_eq!(response.title_simple, "Interest rates go up");
    }
}
