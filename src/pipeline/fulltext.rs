//! Stage 4: full-text fetch (spec §4.4).

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::pipeline::PipelineContext;

/// Resolves full text for every member of every affected cluster. A single
/// URL failure is non-fatal; a cluster with zero successful fetches fails
/// synthesis for that cluster this cycle and is returned to the caller so it
/// can be skipped, remaining eligible next cycle (spec §4.4).
pub(crate) async fn run(ctx: Arc<PipelineContext>, affected_cluster_ids: &[i64]) -> anyhow::Result<Vec<i64>> {
    let concurrency = ctx.config.fetch_concurrency_per_cluster();
    let max_urls = ctx.config.fetch_max_urls_per_cluster();
    let min_chars = ctx.config.fetch_min_text_chars();
    let mut failed_clusters = Vec::new();

    for &cluster_id in affected_cluster_ids {
        let mut items = ctx.dao.get_items_for_cluster(cluster_id).await?;
        // Already ordered by descending score by the DAO; truncate excess.
        items.truncate(max_urls);
        let needing_fetch: Vec<_> = items.into_iter().filter(|i| i.full_text.is_none()).collect();

        let successes: Vec<bool> = stream::iter(needing_fetch)
            .map(|item| {
                let ctx = Arc::clone(&ctx);
                async move {
                    let (text, _method) = ctx.clients.fetch.resolve(&item.url, min_chars).await;
                    match text {
                        Some(text) => {
                            let low_text = text.chars().count() < min_chars;
                            if let Err(error) = ctx.dao.update_item_full_text(item.id, &text, low_text).await {
                                warn!(item_id = item.id, %error, "failed to persist full text");
                                return false;
                            }
                            true
                        }
                        None => {
                            let fallback = item.description.clone().unwrap_or_default();
                            if let Err(error) = ctx.dao.update_item_full_text(item.id, &fallback, true).await {
                                warn!(item_id = item.id, %error, "failed to persist fallback text");
                            }
                            false
                        }
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        if !successes.is_empty() && successes.iter().all(|ok| !ok) {
            warn!(cluster_id, "every full-text fetch failed for cluster this cycle");
            failed_clusters.push(cluster_id);
        }
    }

    Ok(failed_clusters)
}
