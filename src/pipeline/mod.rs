//! The eight-stage processing pipeline (spec §2, §4).
//!
//! Each stage is a free function taking a shared [`PipelineContext`] plus
//! whatever inputs the prior stage produced; state crosses stage boundaries
//! exclusively through the store (spec §9: "implicit coupling through
//! database columns... preserve this contract explicitly").

mod cluster;
mod components;
mod fulltext;
mod image;
mod ingest;
pub mod orchestrator;
mod publish;
#[cfg(test)]
mod scenario_tests;
mod score;
mod synthesize;

use std::collections::HashMap;
use std::sync::Arc;

use crate::clients::Clients;
use crate::config::Config;
use crate::observability::metrics::Metrics;
use crate::store::dao::FeedsynthDao;
use crate::store::models::FeedDescriptor;

/// Everything a pipeline stage needs, built once per cycle (the tier map is
/// rebuilt from the feed descriptor list so a config reload takes effect on
/// the next cycle without a restart).
pub(crate) struct PipelineContext {
    pub(crate) dao: Arc<dyn FeedsynthDao>,
    pub(crate) clients: Arc<Clients>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) config: Arc<Config>,
    tiers: HashMap<String, u8>,
}

impl PipelineContext {
    pub(crate) fn new(
        dao: Arc<dyn FeedsynthDao>,
        clients: Arc<Clients>,
        metrics: Arc<Metrics>,
        config: Arc<Config>,
        feeds: &[FeedDescriptor],
    ) -> Self {
        let tiers = feeds.iter().map(|f| (f.source.clone(), f.tier)).collect();
        Self {
            dao,
            clients,
            metrics,
            config,
            tiers,
        }
    }

    /// Publisher reputation tier, or `0` ("unknown") for a source with no
    /// matching feed descriptor (spec §4.2, §4.5 both treat "unknown" as a
    /// distinct, neutral tier).
    pub(crate) fn tier_for(&self, source: &str) -> u8 {
        *self.tiers.get(source).unwrap_or(&0)
    }
}
