//! Component selection and rendering capability clients (spec §4.7, §6).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};

use crate::clients::retry_send::send_json;
use crate::clients::types::{
    ComponentRenderRequest, ComponentRenderResponse, ComponentSelectionRequest,
    ComponentSelectionResponse,
};
use crate::util::retry::RetryConfig;

/// The only component kinds the core understands; anything the selection
/// capability names outside this set is dropped (spec §4.7).
pub(crate) const ALLOWED_COMPONENTS: [&str; 3] = ["timeline", "details", "chart"];

/// Fallback component set when the capability returns nothing usable.
pub(crate) const DEFAULT_COMPONENTS: [&str; 2] = ["details", "timeline"];

pub(crate) struct ComponentSelectClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
}

impl ComponentSelectClient {
    pub(crate) fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build().context("failed to build component-select client")?,
            base_url: Url::parse(base_url).context("invalid component-select capability base URL")?,
            token,
            timeout,
            retry,
        })
    }

    /// Picks the component set for an article, falling back to
    /// [`DEFAULT_COMPONENTS`] when the capability errors or returns nothing
    /// from the allowed set.
    pub(crate) async fn select(&self, title: &str, body: &str) -> Vec<String> {
        let url = match self.base_url.join("v1/components/select") {
            Ok(url) => url,
            Err(_) => return default_components(),
        };
        let request = ComponentSelectionRequest { title, body };

        let outcome = send_json::<_, ComponentSelectionResponse>(
            || {
                let mut builder = self.client.post(url.clone()).json(&request).timeout(self.timeout);
                if let Some(token) = &self.token {
                    builder = builder.bearer_auth(token);
                }
                builder
            },
            self.retry,
        )
        .await;

        match outcome {
            Ok(response) => {
                let filtered: Vec<String> = response
                    .components
                    .into_iter()
                    .filter(|c| ALLOWED_COMPONENTS.contains(&c.as_str()))
                    .collect();
                if filtered.is_empty() {
                    default_components()
                } else {
                    filtered
                }
            }
            Err(_) => default_components(),
        }
    }
}

fn default_components() -> Vec<String> {
    DEFAULT_COMPONENTS.iter().map(|s| s.to_string()).collect()
}

pub(crate) struct ComponentRenderClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
}

impl ComponentRenderClient {
    pub(crate) fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build().context("failed to build component-render client")?,
            base_url: Url::parse(base_url).context("invalid component-render capability base URL")?,
            token,
            timeout,
            retry,
        })
    }

    /// Renders a single component's payload. Callers drop the component from
    /// the published article if this errors (spec §4.7: "a component that
    /// fails to render is omitted, not the whole article").
    pub(crate) async fn render(
        &self,
        component: &str,
        article_title: &str,
        article_body: &str,
        bundle: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = self
            .base_url
            .join("v1/components/render")
            .context("failed to build component-render URL")?;
        let request = ComponentRenderRequest {
            component,
            article_title,
            article_body,
            bundle,
        };

        let response = send_json::<_, ComponentRenderResponse>(
            || {
                let mut builder = self.client.post(url.clone()).json(&request).timeout(self.timeout);
                if let Some(token) = &self.token {
                    builder = builder.bearer_auth(token);
                }
                builder
            },
            self.retry,
        )
        .await?;

        Ok(response.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn select_falls_back_when_capability_names_unknown_component() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/components/select"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "components": ["map"],
                "emoji": "🗺️",
                "chart_subtype": null
            })))
            .mount(&server)
            .await;

        let client = ComponentSelectClient::new(
            &server.uri(),
            None,
            Duration::from_secs(5),
            RetryConfig::new(2, 1, 10),
        )
        .unwrap();

        let components = client.select("title", "body").await;
        assert_eq!(components, vec!["details".to_string(), "timeline".to_string()]);
    }

    #[tokio::test]
    async fn select_keeps_allowed_subset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/components/select"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "components": ["chart", "map"],
                "emoji": "📈",
                "chart_subtype": "line"
            })))
            .mount(&server)
            .await;

        let client = ComponentSelectClient::new(
            &server.uri(),
            None,
            Duration::from_secs(5),
            RetryConfig::new(2, 1, 10),
        )
        .unwrap();

        let components = client.select("title", "body").await;
        assert_eq!(components, vec!["chart".to_string()]);
    }

    #[tokio::test]
    async fn renders_a_component_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/components/render"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "payload": {"entries": []}
            })))
            .mount(&server)
            .await;

        let client = ComponentRenderClient::new(
            &server.uri(),
            None,
            Duration::from_secs(5),
            RetryConfig::new(2, 1, 10),
        )
        .unwrap();

        let payload = client
            .render("timeline", "title", "body", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(payload, serde_json::json!({"entries": []}));
    }
}
