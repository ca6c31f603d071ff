//! Search capability client (spec §4.7, §6) — gathers supporting bundles
//! (timeline/details/chart) for whichever components were selected.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};

use crate::clients::retry_send::send_json;
use crate::clients::types::{SearchBundles, SearchRequest};
use crate::util::retry::RetryConfig;

pub(crate) struct SearchClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
}

impl SearchClient {
    pub(crate) fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build().context("failed to build search client")?,
            base_url: Url::parse(base_url).context("invalid search capability base URL")?,
            token,
            timeout,
            retry,
        })
    }

    /// Requests supporting bundles for `components`. A provider error here is
    /// not fatal to publication (spec §4.7): callers should treat a returned
    /// `Err` as "no bundles available" rather than aborting the cycle.
    pub(crate) async fn gather(
        &self,
        title: &str,
        body_excerpt: &str,
        components: &[String],
    ) -> Result<SearchBundles> {
        let url = self.base_url.join("v1/search").context("failed to build search URL")?;
        let request = SearchRequest { title, body_excerpt, components };

        send_json::<_, SearchBundles>(
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn gathers_partial_bundles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timeline": [{"date": "2026-01-01", "event": "thing happened"}],
            })))
            .mount(&server)
            .await;

        let client = SearchClient::new(
            &server.uri(),
            None,
            Duration::from_secs(5),
            RetryConfig::new(2, 1, 10),
        )
        .unwrap();

        let bundles = client
            .gather("title", "excerpt", &["timeline".to_string()])
            .await
            .unwrap();
        assert_eq!(bundles.timeline.unwrap().len(), 1);
        assert!(bundles.details.is_none());
        assert!(bundles.chart.is_none());
    }
}
