//! External capability clients (spec §4, §6). The core never talks to an LLM
//! or a search index directly — it calls one of these six typed contracts,
//! each independently retryable and independently swappable.

mod components;
mod fetch;
mod retry_send;
mod scoring;
mod search;
mod synthesis;
mod types;

pub(crate) use components::{ComponentRenderClient, ComponentSelectClient};
pub(crate) use fetch::FetchClient;
pub(crate) use scoring::{Score, ScoringClient, apply_source_credibility_adjustment};
pub(crate) use search::SearchClient;
pub(crate) use synthesis::SynthesisClient;
pub(crate) use types::{
    ChartBundle, ChartPoint, SearchBundles, SourcePackage, SynthesisResponse, TimelineEntry,
};

use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::util::retry::RetryConfig;

/// The six capability clients, constructed once at startup and shared across
/// every pipeline cycle.
pub(crate) struct Clients {
    pub(crate) scoring: ScoringClient,
    pub(crate) fetch: FetchClient,
    pub(crate) search: SearchClient,
    pub(crate) synthesis: SynthesisClient,
    pub(crate) component_select: ComponentSelectClient,
    pub(crate) component_render: ComponentRenderClient,
}

impl Clients {
    pub(crate) fn from_config(config: &Config) -> Result<Self> {
        let retry = RetryConfig::new(
            config.http_max_retries(),
            config.http_backoff_base_ms(),
            config.http_backoff_cap_ms(),
        );

        Ok(Self {
            scoring: ScoringClient::new(
                config.scoring_capability_base_url(),
                config.scoring_service_token().map(str::to_string),
                config.scoring_timeout(),
                retry,
                config.scoring_circuit_failure_threshold(),
                Duration::from_secs(config.scoring_circuit_cooldown_seconds()),
            )?,
            fetch: FetchClient::new(
                config.fetch_capability_base_url(),
                config.fetch_service_token().map(str::to_string),
                config.fetch_timeout(),
                retry,
            )?,
            search: SearchClient::new(
                config.search_capability_base_url(),
                config.search_service_token().map(str::to_string),
                config.search_timeout(),
                retry,
            )?,
            synthesis: SynthesisClient::new(
                config.synthesis_capability_base_url(),
                config.synthesis_service_token().map(str::to_string),
                config.synthesis_timeout(),
                retry,
            )?,
            component_select: ComponentSelectClient::new(
                config.component_select_capability_base_url(),
                config.component_select_service_token().map(str::to_string),
                config.component_timeout(),
                retry,
            )?,
            component_render: ComponentRenderClient::new(
                config.component_render_capability_base_url(),
                config.component_render_service_token().map(str::to_string),
                config.component_timeout(),
                retry,
            )?,
        })
    }
}
