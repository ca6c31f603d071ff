//! FeedsynthDao trait - abstraction over the persistent store (spec §6).
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::store::models::{
    ArticleContent, Cluster, FeedHealth, FetchCycle, NewSourceItem, PublishedArticle, SourceItem,
    UpdateTrigger,
};

#[async_trait]
pub(crate) trait FeedsynthDao: Send + Sync {
    /// Returns the underlying connection pool, when one exists (mocks return `None`).
    fn pool(&self) -> Option<&PgPool>;

    // -- source_items --------------------------------------------------

    /// Inserts a new item. Returns `None` when the insert was rejected by a
    /// uniqueness constraint (url, (guid, source), or fingerprint) — a
    /// duplicate, not an error (spec §7).
    async fn insert_source_item(&self, item: &NewSourceItem) -> anyhow::Result<Option<i64>>;

    /// Items with an image present and `score IS NULL` (scoring never
    /// touches image-less items, spec §4.2).
    async fn get_items_pending_score(&self, limit: i64) -> anyhow::Result<Vec<SourceItem>>;

    async fn update_item_score(
        &self,
        id: i64,
        score: i32,
        category: &str,
        emoji: &str,
        approved: bool,
    ) -> anyhow::Result<()>;

    /// Approved items with `cluster_id IS NULL`.
    async fn get_unclustered_approved_items(&self) -> anyhow::Result<Vec<SourceItem>>;

    async fn attach_item_to_cluster(&self, item_id: i64, cluster_id: i64) -> anyhow::Result<()>;

    async fn get_items_for_cluster(&self, cluster_id: i64) -> anyhow::Result<Vec<SourceItem>>;

    async fn update_item_full_text(
        &self,
        id: i64,
        full_text: &str,
        low_text: bool,
    ) -> anyhow::Result<()>;

    async fn mark_items_consumed(&self, cluster_id: i64) -> anyhow::Result<()>;

    // -- clusters ---------------------------------------------------------

    /// Transitions clusters past the inactivity window or hard-max age to
    /// `closed`. Returns the number of clusters closed.
    async fn close_stale_clusters(
        &self,
        inactivity_window_seconds: i64,
        hard_max_age_seconds: i64,
    ) -> anyhow::Result<u64>;

    /// Active clusters whose `last_updated_at` falls within the sliding
    /// matching window (spec §4.3).
    async fn get_active_clusters(&self, window_seconds: i64) -> anyhow::Result<Vec<Cluster>>;

    async fn get_cluster(&self, cluster_id: i64) -> anyhow::Result<Option<Cluster>>;

    #[allow(clippy::too_many_arguments)]
    async fn create_cluster(
        &self,
        event_label: &str,
        keywords: &[String],
        entities: &[String],
        category: Option<&str>,
        top_score: i32,
    ) -> anyhow::Result<i64>;

    #[allow(clippy::too_many_arguments)]
    async fn update_cluster_after_match(
        &self,
        cluster_id: i64,
        keywords: &[String],
        entities: &[String],
        category: Option<&str>,
        source_count: i32,
        top_score: i32,
        last_updated_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    async fn set_cluster_published_article(
        &self,
        cluster_id: i64,
        published_article_id: i64,
    ) -> anyhow::Result<()>;

    // -- published_articles -----------------------------------------------

    async fn get_published_article_by_cluster(
        &self,
        cluster_id: i64,
    ) -> anyhow::Result<Option<PublishedArticle>>;

    async fn insert_published_article(
        &self,
        cluster_id: i64,
        content: &ArticleContent,
    ) -> anyhow::Result<i64>;

    async fn update_published_article(
        &self,
        id: i64,
        content: &ArticleContent,
        new_version: i32,
    ) -> anyhow::Result<()>;

    // -- article_updates_log -----------------------------------------------

    async fn insert_update_log_entry(
        &self,
        article_id: i64,
        trigger: UpdateTrigger,
        sources_added: i32,
        prev_version: i32,
        new_version: i32,
    ) -> anyhow::Result<()>;

    // -- fetch_cycles -----------------------------------------------------

    async fn start_cycle(&self) -> anyhow::Result<i64>;

    #[allow(clippy::too_many_arguments)]
    async fn finish_cycle(
        &self,
        id: i64,
        feeds_polled: i32,
        items_new: i32,
        items_scored: i32,
        items_approved: i32,
        clusters_affected: i32,
        articles_published: i32,
        status: crate::store::models::CycleStatus,
        error_text: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn get_recent_cycles(&self, limit: i64) -> anyhow::Result<Vec<FetchCycle>>;

    // -- feed health --------------------------------------------------------

    async fn record_feed_success(&self, source: &str) -> anyhow::Result<()>;

    async fn record_feed_failure(&self, source: &str, error: &str) -> anyhow::Result<()>;

    async fn get_feed_health(&self, source: &str) -> anyhow::Result<Option<FeedHealth>>;
}
