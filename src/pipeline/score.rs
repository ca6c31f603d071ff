//! Stage 2: score & filter (spec §4.2).

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::clients::apply_source_credibility_adjustment;
use crate::pipeline::PipelineContext;

#[derive(Debug, Default)]
pub(crate) struct ScoreOutcome {
    pub(crate) items_scored: i32,
    pub(crate) items_approved: i32,
}

/// Scores every item with an image and `score IS NULL`, in parallel with
/// bounded fan-out. A failed call just leaves the item unscored for a later
/// cycle to retry (spec §4.2).
pub(crate) async fn run(ctx: Arc<PipelineContext>) -> anyhow::Result<ScoreOutcome> {
    let pending = ctx.dao.get_items_pending_score(500).await?;
    let concurrency = ctx.config.score_concurrency();
    let threshold = ctx.config.approve_threshold();

    let outcomes: Vec<bool> = stream::iter(pending)
        .map(|item| {
            let ctx = Arc::clone(&ctx);
            async move {
                let excerpt = item.description.clone().unwrap_or_default();
                let tier = ctx.tier_for(&item.source);

                let score = match ctx.clients.scoring.score(&item.title, &item.source, &excerpt).await {
                    Ok(Some(score)) => score,
                    Ok(None) => return false, // circuit breaker open; retry next cycle
                    Err(error) => {
                        warn!(item_id = item.id, %error, "scoring call failed");
                        return false;
                    }
                };

                let adjusted = apply_source_credibility_adjustment(score.score, tier);
                let approved = adjusted >= threshold;

                if let Err(error) = ctx
                    .dao
                    .update_item_score(item.id, adjusted, &score.category, &score.emoji, approved)
                    .await
                {
                    warn!(item_id = item.id, %error, "failed to persist item score");
                    return false;
                }
                true
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = ScoreOutcome::default();
    for scored in outcomes {
        if scored {
            outcome.items_scored += 1;
        }
    }
    // Approval count is read back rather than tracked inline so the metric
    // matches the durable approved flag even if this process restarts mid-stage.
    outcome.items_approved = ctx.dao.get_unclustered_approved_items().await?.len() as i32;
    ctx.metrics.items_scored.inc_by(f64::from(outcome.items_scored));
    ctx.metrics.items_approved.inc_by(f64::from(outcome.items_approved));
    Ok(outcome)
}
