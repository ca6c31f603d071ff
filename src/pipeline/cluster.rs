//! Stage 3: cluster (spec §4.3).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::warn;

use crate::pipeline::PipelineContext;
use crate::store::models::Cluster;
use crate::util::text::{entity_set, jaccard_similarity, keyword_set, normalized_title, title_similarity};

/// Minimum entity-set intersection for a cluster to be shortlisted (spec
/// §4.3); unlike the keyword overlap this is not separately configurable.
const ENTITY_OVERLAP_MIN: usize = 1;

#[derive(Debug, Default)]
pub(crate) struct ClusterOutcome {
    pub(crate) clusters_created: i32,
    pub(crate) clusters_extended: i32,
    pub(crate) affected_cluster_ids: Vec<i64>,
    /// Scores of items attached to each cluster *this cycle* (seed item
    /// included for a newly created cluster), keyed by cluster id. Used by
    /// the publish stage to evaluate the high-score update trigger against
    /// only newly attached members (spec §4.8), not every existing member.
    pub(crate) newly_attached_scores: HashMap<i64, Vec<i32>>,
}

fn shortlist<'a>(
    keywords: &FxHashSet<String>,
    entities: &FxHashSet<String>,
    clusters: &'a [Cluster],
    keyword_overlap_min: usize,
) -> Vec<&'a Cluster> {
    clusters
        .iter()
        .filter(|cluster| {
            let cluster_keywords: FxHashSet<String> = cluster.keywords.iter().cloned().collect();
            let cluster_entities: FxHashSet<String> = cluster.entities.iter().cloned().collect();
            let keyword_overlap = keywords.intersection(&cluster_keywords).count();
            let entity_overlap = entities.intersection(&cluster_entities).count();
            keyword_overlap >= keyword_overlap_min || entity_overlap >= ENTITY_OVERLAP_MIN
        })
        .collect()
}

fn best_match(
    normalized: &str,
    keywords: &FxHashSet<String>,
    entities: &FxHashSet<String>,
    candidates: &[&Cluster],
    threshold: f64,
) -> Option<i64> {
    let mut best: Option<(i64, f64, chrono::DateTime<chrono::Utc>)> = None;
    for cluster in candidates {
        let cluster_keywords: FxHashSet<String> = cluster.keywords.iter().cloned().collect();
        let cluster_entities: FxHashSet<String> = cluster.entities.iter().cloned().collect();
        let cluster_title = normalized_title(&cluster.event_label);

        let score = 0.55 * title_similarity(normalized, &cluster_title)
            + 0.25 * jaccard_similarity(keywords, &cluster_keywords)
            + 0.20 * jaccard_similarity(entities, &cluster_entities);

        if score < threshold {
            continue;
        }

        let better = match &best {
            None => true,
            Some((_, best_score, best_updated)) => {
                score > *best_score || ((score - *best_score).abs() < f64::EPSILON && cluster.last_updated_at > *best_updated)
            }
        };
        if better {
            best = Some((cluster.id, score, cluster.last_updated_at));
        }
    }
    best.map(|(id, ..)| id)
}

/// Closes stale clusters, then attaches each unclustered approved item to
/// the best-matching active cluster or seeds a new one (spec §4.3).
pub(crate) async fn run(ctx: Arc<PipelineContext>) -> anyhow::Result<ClusterOutcome> {
    ctx.dao
        .close_stale_clusters(
            ctx.config.cluster_inactivity_hours() * 3600,
            ctx.config.cluster_hard_max_age_hours() * 3600,
        )
        .await?;

    let items = ctx.dao.get_unclustered_approved_items().await?;
    let window_seconds = ctx.config.cluster_window_hours() * 3600;
    let threshold = ctx.config.cluster_match_threshold();

    let mut outcome = ClusterOutcome::default();
    let mut affected: BTreeSet<i64> = BTreeSet::new();

    for item in items {
        let active_clusters = ctx.dao.get_active_clusters(window_seconds).await?;
        let keywords = keyword_set(&item.title, item.description.as_deref().unwrap_or(""));
        let entities = entity_set(&item.title);
        let normalized = normalized_title(&item.title);

        let candidates = shortlist(
            &keywords,
            &entities,
            &active_clusters,
            ctx.config.cluster_keyword_min_overlap(),
        );
        let matched = best_match(&normalized, &keywords, &entities, &candidates, threshold);

        let cluster_id = match matched {
            Some(cluster_id) => {
                let Some(cluster) = active_clusters.iter().find(|c| c.id == cluster_id) else {
                    continue;
                };
                let merged_keywords: Vec<String> = cluster
                    .keywords
                    .iter()
                    .cloned()
                    .collect::<FxHashSet<_>>()
                    .union(&keywords)
                    .cloned()
                    .collect();
                let merged_entities: Vec<String> = cluster
                    .entities
                    .iter()
                    .cloned()
                    .collect::<FxHashSet<_>>()
                    .union(&entities)
                    .cloned()
                    .collect();
                let top_score = cluster.top_score.unwrap_or(0).max(item.score.unwrap_or(0));

                if let Err(error) = ctx
                    .dao
                    .update_cluster_after_match(
                        cluster_id,
                        &merged_keywords,
                        &merged_entities,
                        item.category.as_deref().or(cluster.category.as_deref()),
                        cluster.source_count + 1,
                        top_score,
                        crate::util::time::now(),
                    )
                    .await
                {
                    warn!(cluster_id, %error, "failed to update cluster after match");
                    continue;
                }
                outcome.clusters_extended += 1;
                cluster_id
            }
            None => {
                let label: String = item.title.chars().take(80).collect();
                match ctx
                    .dao
                    .create_cluster(
                        &label,
                        &keywords.into_iter().collect::<Vec<_>>(),
                        &entities.into_iter().collect::<Vec<_>>(),
                        item.category.as_deref(),
                        item.score.unwrap_or(0),
                    )
                    .await
                {
                    Ok(id) => {
                        outcome.clusters_created += 1;
                        id
                    }
                    Err(error) => {
                        warn!(item_id = item.id, %error, "failed to create cluster");
                        continue;
                    }
                }
            }
        };

        if let Err(error) = ctx.dao.attach_item_to_cluster(item.id, cluster_id).await {
            warn!(item_id = item.id, cluster_id, %error, "failed to attach item to cluster");
            continue;
        }
        affected.insert(cluster_id);
        outcome
            .newly_attached_scores
            .entry(cluster_id)
            .or_default()
            .push(item.score.unwrap_or(0));
    }

    outcome.affected_cluster_ids = affected.into_iter().collect();
    ctx.metrics.clusters_created.inc_by(f64::from(outcome.clusters_created));
    ctx.metrics.clusters_extended.inc_by(f64::from(outcome.clusters_extended));
    Ok(outcome)
}
