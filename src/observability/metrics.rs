use std::sync::Arc;

use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

/// Prometheus metric collection for the pipeline (spec §5, §7 observability).
#[derive(Debug, Clone)]
pub struct Metrics {
    pub feeds_polled: Counter,
    pub items_ingested: Counter,
    pub items_scored: Counter,
    pub items_approved: Counter,
    pub clusters_created: Counter,
    pub clusters_extended: Counter,
    pub articles_published: Counter,
    pub articles_updated: Counter,
    pub capability_retries: Counter,
    pub capability_budget_exhaustions: Counter,
    pub cycle_failures: Counter,

    pub ingest_duration: Histogram,
    pub score_duration: Histogram,
    pub cluster_duration: Histogram,
    pub fulltext_duration: Histogram,
    pub image_duration: Histogram,
    pub synthesize_duration: Histogram,
    pub component_duration: Histogram,
    pub publish_duration: Histogram,
    pub cycle_duration: Histogram,

    pub active_cycle: Gauge,
    pub capability_in_flight: Gauge,
}

impl Metrics {
    #[allow(clippy::too_many_lines)]
    pub fn new(registry: &Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            feeds_polled: register_counter_with_registry!(
                "feedsynth_feeds_polled_total",
                "Total number of feed polls attempted",
                registry
            )?,
            items_ingested: register_counter_with_registry!(
                "feedsynth_items_ingested_total",
                "Total number of new source items persisted",
                registry
            )?,
            items_scored: register_counter_with_registry!(
                "feedsynth_items_scored_total",
                "Total number of source items scored",
                registry
            )?,
            items_approved: register_counter_with_registry!(
                "feedsynth_items_approved_total",
                "Total number of source items approved",
                registry
            )?,
            clusters_created: register_counter_with_registry!(
                "feedsynth_clusters_created_total",
                "Total number of clusters created",
                registry
            )?,
            clusters_extended: register_counter_with_registry!(
                "feedsynth_clusters_extended_total",
                "Total number of clusters extended with a new member",
                registry
            )?,
            articles_published: register_counter_with_registry!(
                "feedsynth_articles_published_total",
                "Total number of published_articles rows inserted",
                registry
            )?,
            articles_updated: register_counter_with_registry!(
                "feedsynth_articles_updated_total",
                "Total number of published_articles rows updated in place",
                registry
            )?,
            capability_retries: register_counter_with_registry!(
                "feedsynth_capability_retries_total",
                "Total number of retried external capability calls",
                registry
            )?,
            capability_budget_exhaustions: register_counter_with_registry!(
                "feedsynth_capability_budget_exhaustions_total",
                "Total number of times a per-cycle capability budget was exhausted",
                registry
            )?,
            cycle_failures: register_counter_with_registry!(
                "feedsynth_cycle_failures_total",
                "Total number of cycles that ended in failed status",
                registry
            )?,
            ingest_duration: register_histogram_with_registry!(
                "feedsynth_ingest_duration_seconds",
                "Duration of the ingest stage",
                registry
            )?,
            score_duration: register_histogram_with_registry!(
                "feedsynth_score_duration_seconds",
                "Duration of the score & filter stage",
                registry
            )?,
            cluster_duration: register_histogram_with_registry!(
                "feedsynth_cluster_duration_seconds",
                "Duration of the cluster stage",
                registry
            )?,
            fulltext_duration: register_histogram_with_registry!(
                "feedsynth_fulltext_duration_seconds",
                "Duration of the full-text fetch stage",
                registry
            )?,
            image_duration: register_histogram_with_registry!(
                "feedsynth_image_duration_seconds",
                "Duration of the image selection stage",
                registry
            )?,
            synthesize_duration: register_histogram_with_registry!(
                "feedsynth_synthesize_duration_seconds",
                "Duration of the synthesise stage",
                registry
            )?,
            component_duration: register_histogram_with_registry!(
                "feedsynth_component_duration_seconds",
                "Duration of the component selection & generation stage",
                registry
            )?,
            publish_duration: register_histogram_with_registry!(
                "feedsynth_publish_duration_seconds",
                "Duration of the publish stage",
                registry
            )?,
            cycle_duration: register_histogram_with_registry!(
                "feedsynth_cycle_duration_seconds",
                "Duration of an entire pipeline cycle",
                registry
            )?,
            active_cycle: register_gauge_with_registry!(
                "feedsynth_active_cycle",
                "1 while a pipeline cycle is running, else 0",
                registry
            )?,
            capability_in_flight: register_gauge_with_registry!(
                "feedsynth_capability_in_flight",
                "Number of external capability calls currently in flight",
                registry
            )?,
        })
    }
}
