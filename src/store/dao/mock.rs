//! In-memory `FeedsynthDao` used by stage unit tests (no Postgres required).
//!
//! Unlike the Postgres implementation this mock keeps real state and
//! enforces the same uniqueness rules, so pipeline stage tests can assert on
//! actual behaviour rather than merely that a method was called.

#![cfg(test)]

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::dao_trait::FeedsynthDao;
use crate::store::models::{
    ArticleContent, Cluster, ClusterStatus, CycleStatus, FeedHealth, FetchCycle, NewSourceItem,
    PublishedArticle, SourceItem, UpdateTrigger,
};

#[derive(Default)]
struct MockState {
    source_items: Vec<SourceItem>,
    clusters: Vec<Cluster>,
    published_articles: Vec<PublishedArticle>,
    cycles: Vec<FetchCycle>,
    feed_health: Vec<FeedHealth>,
    next_item_id: i64,
    next_cluster_id: i64,
    next_article_id: i64,
    next_cycle_id: i64,
}

pub(crate) struct MockFeedsynthDao {
    state: Mutex<MockState>,
}

impl MockFeedsynthDao {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_item_id: 1,
                next_cluster_id: 1,
                next_article_id: 1,
                next_cycle_id: 1,
                ..MockState::default()
            }),
        }
    }

    pub(crate) fn source_items_snapshot(&self) -> Vec<SourceItem> {
        self.state.lock().unwrap().source_items.clone()
    }

    pub(crate) fn clusters_snapshot(&self) -> Vec<Cluster> {
        self.state.lock().unwrap().clusters.clone()
    }

    pub(crate) fn published_articles_snapshot(&self) -> Vec<PublishedArticle> {
        self.state.lock().unwrap().published_articles.clone()
    }
}

#[async_trait]
impl FeedsynthDao for MockFeedsynthDao {
    fn pool(&self) -> Option<&PgPool> {
        None
    }

    async fn insert_source_item(&self, item: &NewSourceItem) -> anyhow::Result<Option<i64>> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.source_items.iter().any(|existing| {
            existing.url == item.url
                || existing.fingerprint == item.fingerprint
                || (!item.guid.as_deref().unwrap_or("").is_empty()
                    && existing.guid == item.guid
                    && existing.source == item.source)
        });
        if duplicate {
            return Ok(None);
        }

        let id = state.next_item_id;
        state.next_item_id += 1;
        state.source_items.push(SourceItem {
            id,
            url: item.url.clone(),
            guid: item.guid.clone(),
            source: item.source.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            full_text: None,
            image_url: item.image_url.clone(),
            author: item.author.clone(),
            published_at: item.published_at,
            fetched_at: item.fetched_at,
            score: None,
            category: None,
            emoji: None,
            approved: false,
            consumed: false,
            cluster_id: None,
            fingerprint: item.fingerprint.clone(),
            low_text: false,
        });
        Ok(Some(id))
    }

    async fn get_items_pending_score(&self, limit: i64) -> anyhow::Result<Vec<SourceItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .source_items
            .iter()
            .filter(|item| item.score.is_none() && item.image_url.is_some())
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_item_score(
        &self,
        id: i64,
        score: i32,
        category: &str,
        emoji: &str,
        approved: bool,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(item) = state.source_items.iter_mut().find(|i| i.id == id) {
            item.score = Some(score);
            item.category = Some(category.to_string());
            item.emoji = Some(emoji.to_string());
            item.approved = approved;
        }
        Ok(())
    }

    async fn get_unclustered_approved_items(&self) -> anyhow::Result<Vec<SourceItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .source_items
            .iter()
            .filter(|item| item.approved && item.cluster_id.is_none() && !item.consumed)
            .cloned()
            .collect())
    }

    async fn attach_item_to_cluster(&self, item_id: i64, cluster_id: i64) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(item) = state.source_items.iter_mut().find(|i| i.id == item_id) {
            item.cluster_id = Some(cluster_id);
        }
        Ok(())
    }

    async fn get_items_for_cluster(&self, cluster_id: i64) -> anyhow::Result<Vec<SourceItem>> {
        let state = self.state.lock().unwrap();
        let mut items: Vec<SourceItem> = state
            .source_items
            .iter()
            .filter(|item| item.cluster_id == Some(cluster_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.score.unwrap_or(0).cmp(&a.score.unwrap_or(0)));
        Ok(items)
    }

    async fn update_item_full_text(
        &self,
        id: i64,
        full_text: &str,
        low_text: bool,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(item) = state.source_items.iter_mut().find(|i| i.id == id) {
            item.full_text = Some(full_text.to_string());
            item.low_text = low_text;
        }
        Ok(())
    }

    async fn mark_items_consumed(&self, cluster_id: i64) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        for item in state
            .source_items
            .iter_mut()
            .filter(|item| item.cluster_id == Some(cluster_id))
        {
            item.consumed = true;
        }
        Ok(())
    }

    async fn close_stale_clusters(
        &self,
        inactivity_window_seconds: i64,
        hard_max_age_seconds: i64,
    ) -> anyhow::Result<u64> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut closed = 0;
        for cluster in state
            .clusters
            .iter_mut()
            .filter(|c| c.status == ClusterStatus::Active)
        {
            // Strict: a cluster exactly at the boundary is still active, only
            // closing once strictly past it (matches dao_impl.rs's
            // `last_updated_at < NOW() - interval` / `created_at < NOW() -
            // interval`, spec §8: "one second younger... is active").
            let inactive = (now - cluster.last_updated_at).num_seconds() > inactivity_window_seconds;
            let too_old = (now - cluster.created_at).num_seconds() > hard_max_age_seconds;
            if inactive || too_old {
                cluster.status = ClusterStatus::Closed;
                closed += 1;
            }
        }
        Ok(closed)
    }

    async fn get_active_clusters(&self, window_seconds: i64) -> anyhow::Result<Vec<Cluster>> {
        let state = self.state.lock().unwrap();
        let now = Utc::now();
        Ok(state
            .clusters
            .iter()
            .filter(|c| {
                c.status == ClusterStatus::Active
                    && (now - c.last_updated_at).num_seconds() <= window_seconds
            })
            .cloned()
            .collect())
    }

    async fn get_cluster(&self, cluster_id: i64) -> anyhow::Result<Option<Cluster>> {
        let state = self.state.lock().unwrap();
        Ok(state.clusters.iter().find(|c| c.id == cluster_id).cloned())
    }

    async fn create_cluster(
        &self,
        event_label: &str,
        keywords: &[String],
        entities: &[String],
        category: Option<&str>,
        top_score: i32,
    ) -> anyhow::Result<i64> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_cluster_id;
        state.next_cluster_id += 1;
        let now = Utc::now();
        state.clusters.push(Cluster {
            id,
            event_label: event_label.to_string(),
            keywords: keywords.to_vec(),
            entities: entities.to_vec(),
            category: category.map(ToString::to_string),
            status: ClusterStatus::Active,
            source_count: 1,
            top_score: Some(top_score),
            created_at: now,
            last_updated_at: now,
            published_article_id: None,
        });
        Ok(id)
    }

    async fn update_cluster_after_match(
        &self,
        cluster_id: i64,
        keywords: &[String],
        entities: &[String],
        category: Option<&str>,
        source_count: i32,
        top_score: i32,
        last_updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(cluster) = state.clusters.iter_mut().find(|c| c.id == cluster_id) {
            cluster.keywords = keywords.to_vec();
            cluster.entities = entities.to_vec();
            cluster.category = category.map(ToString::to_string);
            cluster.source_count = source_count;
            cluster.top_score = Some(top_score);
            cluster.last_updated_at = last_updated_at;
        }
        Ok(())
    }

    async fn set_cluster_published_article(
        &self,
        cluster_id: i64,
        published_article_id: i64,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(cluster) = state.clusters.iter_mut().find(|c| c.id == cluster_id) {
            cluster.published_article_id = Some(published_article_id);
        }
        Ok(())
    }

    async fn get_published_article_by_cluster(
        &self,
        cluster_id: i64,
    ) -> anyhow::Result<Option<PublishedArticle>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .published_articles
            .iter()
            .find(|a| a.cluster_id == cluster_id)
            .cloned())
    }

    async fn insert_published_article(
        &self,
        cluster_id: i64,
        content: &ArticleContent,
    ) -> anyhow::Result<i64> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_article_id;
        state.next_article_id += 1;
        let now = Utc::now();
        state.published_articles.push(PublishedArticle {
            id,
            cluster_id,
            title_pro: content.title_pro.clone(),
            title_simple: content.title_simple.clone(),
            bullets_pro: content.bullets_pro.clone(),
            bullets_simple: content.bullets_simple.clone(),
            body_pro: content.body_pro.clone(),
            body_simple: content.body_simple.clone(),
            category: content.category.clone(),
            emoji: content.emoji.clone(),
            image_url: content.image_url.clone(),
            image_attribution: content.image_attribution.clone(),
            components: content.components.clone(),
            timeline: content.timeline.clone(),
            details: content.details.clone(),
            chart: content.chart.clone(),
            ai_final_score: content.ai_final_score,
            num_sources: content.num_sources,
            version: 1,
            created_at: now,
            updated_at: now,
            source_urls: content.source_urls.clone(),
        });
        Ok(id)
    }

    async fn update_published_article(
        &self,
        id: i64,
        content: &ArticleContent,
        new_version: i32,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(article) = state.published_articles.iter_mut().find(|a| a.id == id) {
            article.title_pro = content.title_pro.clone();
            article.title_simple = content.title_simple.clone();
            article.bullets_pro = content.bullets_pro.clone();
            article.bullets_simple = content.bullets_simple.clone();
            article.body_pro = content.body_pro.clone();
            article.body_simple = content.body_simple.clone();
            article.category = content.category.clone();
            article.emoji = content.emoji.clone();
            article.image_url = content.image_url.clone();
            article.image_attribution = content.image_attribution.clone();
            article.components = content.components.clone();
            article.timeline = content.timeline.clone();
            article.details = content.details.clone();
            article.chart = content.chart.clone();
            article.ai_final_score = content.ai_final_score;
            article.num_sources = content.num_sources;
            article.version = new_version;
            article.source_urls = content.source_urls.clone();
            article.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_update_log_entry(
        &self,
        _article_id: i64,
        _trigger: UpdateTrigger,
        _sources_added: i32,
        _prev_version: i32,
        _new_version: i32,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start_cycle(&self) -> anyhow::Result<i64> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_cycle_id;
        state.next_cycle_id += 1;
        state.cycles.push(FetchCycle {
            id,
            started_at: Utc::now(),
            finished_at: None,
            feeds_polled: 0,
            items_new: 0,
            items_scored: 0,
            items_approved: 0,
            clusters_affected: 0,
            articles_published: 0,
            status: CycleStatus::Running,
            error_text: None,
        });
        Ok(id)
    }

    async fn finish_cycle(
        &self,
        id: i64,
        feeds_polled: i32,
        items_new: i32,
        items_scored: i32,
        items_approved: i32,
        clusters_affected: i32,
        articles_published: i32,
        status: CycleStatus,
        error_text: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(cycle) = state.cycles.iter_mut().find(|c| c.id == id) {
            cycle.finished_at = Some(Utc::now());
            cycle.feeds_polled = feeds_polled;
            cycle.items_new = items_new;
            cycle.items_scored = items_scored;
            cycle.items_approved = items_approved;
            cycle.clusters_affected = clusters_affected;
            cycle.articles_published = articles_published;
            cycle.status = status;
            cycle.error_text = error_text.map(ToString::to_string);
        }
        Ok(())
    }

    async fn get_recent_cycles(&self, limit: i64) -> anyhow::Result<Vec<FetchCycle>> {
        let state = self.state.lock().unwrap();
        let mut cycles = state.cycles.clone();
        cycles.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        cycles.truncate(limit.max(0) as usize);
        Ok(cycles)
    }

    async fn record_feed_success(&self, source: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(health) = state.feed_health.iter_mut().find(|h| h.source == source) {
            health.consecutive_failures = 0;
            health.last_success_at = Some(Utc::now());
        } else {
            state.feed_health.push(FeedHealth {
                source: source.to_string(),
                consecutive_failures: 0,
                last_success_at: Some(Utc::now()),
                last_failure_at: None,
                last_error: None,
            });
        }
        Ok(())
    }

    async fn record_feed_failure(&self, source: &str, error: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(health) = state.feed_health.iter_mut().find(|h| h.source == source) {
            health.consecutive_failures += 1;
            health.last_failure_at = Some(Utc::now());
            health.last_error = Some(error.to_string());
        } else {
            state.feed_health.push(FeedHealth {
                source: source.to_string(),
                consecutive_failures: 1,
                last_success_at: None,
                last_failure_at: Some(Utc::now()),
                last_error: Some(error.to_string()),
            });
        }
        Ok(())
    }

    async fn get_feed_health(&self, source: &str) -> anyhow::Result<Option<FeedHealth>> {
        let state = self.state.lock().unwrap();
        Ok(state.feed_health.iter().find(|h| h.source == source).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_item(url: &str, fingerprint: &str) -> NewSourceItem {
        NewSourceItem {
            url: url.to_string(),
            guid: None,
            source: "Reuters".to_string(),
            title: "Sample title".to_string(),
            description: Some("excerpt".to_string()),
            image_url: Some("https://example.com/img.jpg".to_string()),
            author: None,
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            fingerprint: fingerprint.to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_url_is_rejected() {
        let dao = MockFeedsynthDao::new();
        let first = dao
            .insert_source_item(&sample_item("https://example.com/a", "fp1"))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = dao
            .insert_source_item(&sample_item("https://example.com/a", "fp2"))
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_rejected() {
        let dao = MockFeedsynthDao::new();
        dao.insert_source_item(&sample_item("https://example.com/a", "fp1"))
            .await
            .unwrap();
        let second = dao
            .insert_source_item(&sample_item("https://example.com/b", "fp1"))
            .await
            .unwrap();
        assert!(second.is_none());
    }
}
