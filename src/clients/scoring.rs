//! Scoring capability client (spec §4.2, §6).

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::{Client, Url};

use crate::clients::retry_send::send_json;
use crate::clients::types::{ScoreRequest, ScoreResponse};
use crate::util::circuit_breaker::CircuitBreaker;
use crate::util::retry::RetryConfig;

#[derive(Debug, Clone)]
pub(crate) struct Score {
    pub(crate) score: i32,
    pub(crate) category: String,
    pub(crate) emoji: String,
}

pub(crate) struct ScoringClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
    breaker: CircuitBreaker,
}

impl ScoringClient {
    pub(crate) fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        retry: RetryConfig,
        circuit_failure_threshold: u32,
        circuit_cooldown: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build().context("failed to build scoring client")?,
            base_url: Url::parse(base_url).context("invalid scoring capability base URL")?,
            token,
            timeout,
            retry,
            breaker: CircuitBreaker::new(circuit_failure_threshold, circuit_cooldown),
        })
    }

    /// Returns `None` when the circuit breaker is currently open (spec §4.2:
    /// "halts further calls for a cooldown window").
    pub(crate) async fn score(
        &self,
        title: &str,
        source: &str,
        excerpt: &str,
    ) -> Result<Option<Score>> {
        if self.breaker.is_open() {
            return Ok(None);
        }

        let url = self
            .base_url
            .join("v1/score")
            .context("failed to build scoring URL")?;
        let request = ScoreRequest { title, source, excerpt };

        let outcome = send_json::<_, ScoreResponse>(
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
                self.breaker.record_success();
                if !(0..=1000).contains(&response.score) {
                    bail!("scoring capability returned out-of-range score {}", response.score);
                }
                Ok(Some(Score {
                    score: response.score,
                    category: response.category,
                    emoji: response.emoji,
                }))
            }
            Err(error) => {
                self.breaker.record_failure();
                Err(error)
            }
        }
    }
}

/// Source-credibility adjustment applied by the core after the raw score
/// comes back (spec §4.2): `(tier_score - 5) * 8`, clamped to `[0, 1000]`.
/// Tier 1 -> tier_score 9, tier 2 -> 6, tier 3 -> 3, unknown -> 5 (neutral).
#[must_use]
pub(crate) fn apply_source_credibility_adjustment(raw_score: i32, tier: u8) -> i32 {
    let tier_score: i32 = match tier {
        1 => 9,
        2 => 6,
        3 => 3,
        _ => 5,
    };
    let adjusted = raw_score + (tier_score - 5) * 8;
    adjusted.clamp(0, 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> ScoringClient {
        ScoringClient::new(
            &base_url,
            None,
            Duration::from_secs(5),
            RetryConfig::new(3, 1, 10),
            5,
            Duration::from_secs(60),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn scores_a_well_formed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/score"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 920,
                "category": "finance",
                "emoji": "💶",
                "reasoning": "central bank rate decision"
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let score = client
            .score("ECB raises rates", "Reuters", "excerpt")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(score.score, 920);
        assert_eq!(score.category, "finance");
    }

    #[tokio::test]
    async fn rejects_out_of_range_score() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/score"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 1500,
                "category": "x",
                "emoji": "x",
                "reasoning": "x"
            })))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let error = client.score("title", "source", "excerpt").await.unwrap_err();
        assert!(error.to_string().contains("out-of-range"));
    }

    #[test]
    fn credibility_adjustment_matches_spec_formula() {
        assert_eq!(apply_source_credibility_adjustment(700, 1), 732);
        assert_eq!(apply_source_credibility_adjustment(700, 3), 684);
        assert_eq!(apply_source_credibility_adjustment(990, 1), 1000);
        assert_eq!(apply_source_credibility_adjustment(10, 3), 0);
    }
}
