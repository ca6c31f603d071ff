//! Ties the eight stages together into one cycle, enforcing the soft/hard
//! cycle deadlines (spec §5) and writing the `fetch_cycles` ledger row.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::pipeline::PipelineContext;
use crate::pipeline::{cluster, components, fulltext, image, ingest, publish, score, synthesize};
use crate::store::models::{CycleStatus, FeedDescriptor};

/// Outcome of processing one affected cluster through image select →
/// synthesize → components → publish (spec §4.5-§4.8), reported back to
/// `run_cycle` after the bounded-fan-out stream collects every cluster's
/// result, so cross-cluster counters/errors are aggregated in one place
/// regardless of completion order.
enum ClusterOutcome {
    Published,
    Skipped,
    Error(String),
}

#[derive(Debug, Default)]
pub struct CycleSummary {
    pub cycle_id: i64,
    pub feeds_polled: i32,
    pub items_new: i32,
    pub items_scored: i32,
    pub items_approved: i32,
    pub clusters_affected: i32,
    pub articles_published: i32,
}

/// Runs one full pipeline cycle. Errors from individual stages are logged
/// and recorded on the cycle row rather than propagated; only a failure to
/// even start/finish the cycle ledger itself is returned as an `Err`.
pub async fn run_cycle(ctx: Arc<PipelineContext>, feeds: &[FeedDescriptor]) -> anyhow::Result<CycleSummary> {
    let cycle_id = ctx.dao.start_cycle().await?;
    ctx.metrics.active_cycle.set(1.0);
    let cycle_started = Instant::now();
    let soft_deadline = ctx.config.cycle_soft_deadline_seconds();
    let hard_deadline = ctx.config.cycle_hard_deadline_seconds();

    let mut summary = CycleSummary {
        cycle_id,
        ..CycleSummary::default()
    };
    let mut first_error: Option<String> = None;

    let ingest_timer = ctx.metrics.ingest_duration.start_timer();
    let ingest_outcome = ingest::run(Arc::clone(&ctx), feeds).await;
    ingest_timer.observe_duration();
    summary.feeds_polled = ingest_outcome.feeds_polled;
    summary.items_new = ingest_outcome.items_new;

    let score_timer = ctx.metrics.score_duration.start_timer();
    match score::run(Arc::clone(&ctx)).await {
        Ok(outcome) => {
            summary.items_scored = outcome.items_scored;
            summary.items_approved = outcome.items_approved;
        }
        Err(error) => {
            warn!(%error, "score stage failed");
            first_error.get_or_insert(error.to_string());
        }
    }
    score_timer.observe_duration();

    let cluster_timer = ctx.metrics.cluster_duration.start_timer();
    let (affected, newly_attached_scores) = match cluster::run(Arc::clone(&ctx)).await {
        Ok(outcome) => {
            summary.clusters_affected = outcome.affected_cluster_ids.len() as i32;
            (outcome.affected_cluster_ids, outcome.newly_attached_scores)
        }
        Err(error) => {
            warn!(%error, "cluster stage failed");
            first_error.get_or_insert(error.to_string());
            (Vec::new(), HashMap::new())
        }
    };
    cluster_timer.observe_duration();

    let fulltext_failed: Vec<i64> = if soft_deadline_exceeded(cycle_started, soft_deadline) {
        warn!(cycle_id, "soft deadline exceeded before full-text fetch; deferring remaining work");
        Vec::new()
    } else {
        let fulltext_timer = ctx.metrics.fulltext_duration.start_timer();
        let failed = match fulltext::run(Arc::clone(&ctx), &affected).await {
            Ok(failed) => failed,
            Err(error) => {
                warn!(%error, "full-text fetch stage failed");
                first_error.get_or_insert(error.to_string());
                Vec::new()
            }
        };
        fulltext_timer.observe_duration();
        failed
    };

    // Publish highest-impact clusters first (spec §4.8). Preliminary
    // ordering uses the same cluster-score formula the publish stage itself
    // computes from the now-fetched member set. A cluster with zero
    // successful full-text fetches is skipped entirely this cycle (spec
    // §4.4: "only zero successful fetches for a cluster fails synthesis for
    // that cluster this cycle"); it remains active and eligible next cycle.
    let mut ordered_clusters: Vec<(i64, Vec<crate::store::models::SourceItem>)> = Vec::new();
    for cluster_id in affected {
        if fulltext_failed.contains(&cluster_id) {
            continue;
        }
        match ctx.dao.get_items_for_cluster(cluster_id).await {
            Ok(items) => ordered_clusters.push((cluster_id, items)),
            Err(error) => warn!(cluster_id, %error, "failed to load cluster members"),
        }
    }
    ordered_clusters.sort_by(|a, b| publish::cluster_score(&b.1).cmp(&publish::cluster_score(&a.1)));

    // Articles are processed with bounded fan-out (spec §4.7, §5: "default 5
    // articles concurrently"), not one cluster at a time.
    let concurrency = ctx.config.component_concurrency();
    let outcomes: Vec<ClusterOutcome> = stream::iter(ordered_clusters)
        .map(|(cluster_id, members)| {
            let ctx = Arc::clone(&ctx);
            let new_scores = newly_attached_scores.get(&cluster_id).cloned().unwrap_or_default();
            async move {
                if hard_deadline_exceeded(cycle_started, hard_deadline) {
                    warn!(cycle_id, cluster_id, "hard deadline exceeded; cluster deferred to next cycle");
                    return ClusterOutcome::Skipped;
                }

                let image_timer = ctx.metrics.image_duration.start_timer();
                let selected_image = image::select(&ctx, &members);
                image_timer.observe_duration();

                let synth_timer = ctx.metrics.synthesize_duration.start_timer();
                let draft = match synthesize::run(Arc::clone(&ctx), &members).await {
                    Ok(Some(draft)) => draft,
                    Ok(None) => {
                        synth_timer.observe_duration();
                        return ClusterOutcome::Skipped;
                    }
                    Err(error) => {
                        synth_timer.observe_duration();
                        warn!(cluster_id, %error, "synthesis stage failed");
                        return ClusterOutcome::Error(error.to_string());
                    }
                };
                synth_timer.observe_duration();

                let component_timer = ctx.metrics.component_duration.start_timer();
                let generated = components::run(Arc::clone(&ctx), &draft.title_pro, &draft.body_pro).await;
                component_timer.observe_duration();
                let Some(generated) = generated else {
                    // Every selected component failed to render/validate: an
                    // empty component list would violate the "components
                    // non-empty" invariant (spec §3, §8), so defer instead
                    // of publishing (same defer semantics as synthesis
                    // failure).
                    return ClusterOutcome::Skipped;
                };

                let publish_timer = ctx.metrics.publish_duration.start_timer();
                let published = publish::publish_cluster(
                    &ctx,
                    cluster_id,
                    &draft,
                    selected_image.as_ref(),
                    &generated,
                    &members,
                    &new_scores,
                )
                .await;
                publish_timer.observe_duration();

                match published {
                    Ok(true) => ClusterOutcome::Published,
                    Ok(false) => ClusterOutcome::Skipped,
                    Err(error) => {
                        warn!(cluster_id, %error, "publish stage failed");
                        ClusterOutcome::Error(error.to_string())
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for outcome in outcomes {
        match outcome {
            ClusterOutcome::Published => summary.articles_published += 1,
            ClusterOutcome::Skipped => {}
            ClusterOutcome::Error(error) => {
                first_error.get_or_insert(error);
            }
        }
    }

    let status = if first_error.is_some() {
        ctx.metrics.cycle_failures.inc();
        CycleStatus::Failed
    } else {
        CycleStatus::Completed
    };

    ctx.dao
        .finish_cycle(
            cycle_id,
            summary.feeds_polled,
            summary.items_new,
            summary.items_scored,
            summary.items_approved,
            summary.clusters_affected,
            summary.articles_published,
            status,
            first_error.as_deref(),
        )
        .await?;

    ctx.metrics.active_cycle.set(0.0);
    info!(cycle_id, articles_published = summary.articles_published, "cycle complete");
    Ok(summary)
}

fn soft_deadline_exceeded(started: Instant, soft_deadline_seconds: u64) -> bool {
    started.elapsed().as_secs() >= soft_deadline_seconds
}

fn hard_deadline_exceeded(started: Instant, hard_deadline_seconds: u64) -> bool {
    started.elapsed().as_secs() >= hard_deadline_seconds
}
