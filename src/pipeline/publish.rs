//! Stage 8: publish (spec §4.8).

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::pipeline::PipelineContext;
use crate::pipeline::components::GeneratedComponents;
use crate::pipeline::image::SelectedImage;
use crate::pipeline::synthesize::SynthesisDraft;
use crate::store::models::{ArticleContent, PublishedArticle, SourceItem, UpdateTrigger};

const HIGH_SCORE_TRIGGER: i32 = 850;
const VOLUME_TRIGGER_NEW_MEMBERS: i32 = 2;

/// `cluster_score = min(round(avg + min(n*10, 100)), 1000)` (spec §4.8).
#[must_use]
pub(crate) fn cluster_score(items: &[SourceItem]) -> i32 {
    if items.is_empty() {
        return 0;
    }
    let n = items.len() as f64;
    let avg = items.iter().map(|i| f64::from(i.score.unwrap_or(0))).sum::<f64>() / n;
    let bonus = (n * 10.0).min(100.0);
    ((avg + bonus).round() as i32).min(1000)
}

fn update_trigger(
    existing: &PublishedArticle,
    newly_attached_scores: &[i32],
    current_member_count: i32,
) -> Option<UpdateTrigger> {
    if newly_attached_scores.iter().any(|&s| s >= HIGH_SCORE_TRIGGER) {
        return Some(UpdateTrigger::NewHighScore);
    }
    if current_member_count - existing.num_sources >= VOLUME_TRIGGER_NEW_MEMBERS {
        return Some(UpdateTrigger::Volume);
    }
    None
}

/// Publishes or republishes one affected cluster. Returns `true` if a row
/// was inserted or updated.
pub(crate) async fn publish_cluster(
    ctx: &Arc<PipelineContext>,
    cluster_id: i64,
    draft: &SynthesisDraft,
    image: Option<&SelectedImage>,
    components: &GeneratedComponents,
    members: &[SourceItem],
    newly_attached_scores: &[i32],
) -> anyhow::Result<bool> {
    let score = cluster_score(members);
    let content = ArticleContent {
        title_pro: draft.title_pro.clone(),
        title_simple: draft.title_simple.clone(),
        bullets_pro: draft.bullets_pro.clone(),
        bullets_simple: draft.bullets_simple.clone(),
        body_pro: draft.body_pro.clone(),
        body_simple: draft.body_simple.clone(),
        category: draft.category.clone(),
        emoji: members
            .iter()
            .find_map(|m| m.emoji.clone())
            .unwrap_or_default(),
        image_url: image.map(|i| i.url.clone()),
        image_attribution: image.map(|i| i.attribution.clone()),
        components: components.components.clone(),
        timeline: components.timeline.clone(),
        details: components.details.clone(),
        chart: components.chart.clone(),
        ai_final_score: score,
        // The synthesis draft's `source_urls`/`num_sources` reflect only the
        // (possibly truncated) subset fed to the synthesis capability; the
        // published record's contributing sources must be exactly the
        // cluster's members at publish time (spec §3, §8 invariant).
        num_sources: members.len() as i32,
        source_urls: members.iter().map(|m| m.url.clone()).collect(),
    };

    let existing = ctx.dao.get_published_article_by_cluster(cluster_id).await?;

    let published = match existing {
        None => {
            let article_id = ctx.dao.insert_published_article(cluster_id, &content).await?;
            ctx.dao.set_cluster_published_article(cluster_id, article_id).await?;
            ctx.dao
                .insert_update_log_entry(article_id, UpdateTrigger::Initial, content.num_sources, 0, 1)
                .await?;
            ctx.metrics.articles_published.inc();
            true
        }
        Some(existing) => {
            let cooldown_elapsed =
                (Utc::now() - existing.updated_at).num_minutes() >= ctx.config.update_cooldown_minutes();
            let trigger = update_trigger(&existing, newly_attached_scores, content.num_sources);

            match trigger {
                Some(trigger) if cooldown_elapsed => {
                    let new_version = existing.version + 1;
                    ctx.dao
                        .update_published_article(existing.id, &content, new_version)
                        .await?;
                    ctx.dao
                        .insert_update_log_entry(
                            existing.id,
                            trigger,
                            content.num_sources - existing.num_sources,
                            existing.version,
                            new_version,
                        )
                        .await?;
                    ctx.metrics.articles_updated.inc();
                    true
                }
                Some(_) => {
                    warn!(cluster_id, "update trigger fired but cooldown has not elapsed");
                    false
                }
                None => false,
            }
        }
    };

    if published {
        ctx.dao.mark_items_consumed(cluster_id).await?;
    }

    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(score: i32) -> SourceItem {
        SourceItem {
            id: 1,
            url: "https://example.com".to_string(),
            guid: None,
            source: "Reuters".to_string(),
            title: "t".to_string(),
            description: None,
            full_text: None,
            image_url: None,
            author: None,
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            score: Some(score),
            category: None,
            emoji: None,
            approved: true,
            consumed: false,
            cluster_id: Some(1),
            fingerprint: "fp".to_string(),
            low_text: false,
        }
    }

    #[test]
    fn matches_scenario_a_two_source_cluster() {
        let items = vec![item(920), item(880)];
        assert_eq!(cluster_score(&items), 920);
    }

    #[test]
    fn score_clamps_at_1000() {
        let items = vec![item(1000); 20];
        assert_eq!(cluster_score(&items), 1000);
    }
}
