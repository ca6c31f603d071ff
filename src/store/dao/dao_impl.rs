//! FeedsynthDaoImpl - Postgres-backed implementation of `FeedsynthDao`.
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use super::dao_trait::FeedsynthDao;
use crate::store::models::{
    ArticleContent, Cluster, ClusterStatus, ComponentKind, CycleStatus, FeedHealth, FetchCycle,
    NewSourceItem, PublishedArticle, SourceItem, UpdateTrigger,
};

#[derive(Debug, Clone)]
pub(crate) struct FeedsynthDaoImpl {
    pool: PgPool,
}

impl FeedsynthDaoImpl {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn string_list_from_json(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn components_from_json(value: Value) -> Vec<ComponentKind> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().and_then(ComponentKind::parse))
            .collect(),
        _ => Vec::new(),
    }
}

fn row_to_source_item(row: &sqlx::postgres::PgRow) -> anyhow::Result<SourceItem> {
    Ok(SourceItem {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        guid: row.try_get("guid")?,
        source: row.try_get("source")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        full_text: row.try_get("full_text")?,
        image_url: row.try_get("image_url")?,
        author: row.try_get("author")?,
        published_at: row.try_get("published_at")?,
        fetched_at: row.try_get("fetched_at")?,
        score: row.try_get("score")?,
        category: row.try_get("category")?,
        emoji: row.try_get("emoji")?,
        approved: row.try_get("approved")?,
        consumed: row.try_get("consumed")?,
        cluster_id: row.try_get("cluster_id")?,
        fingerprint: row.try_get("fingerprint")?,
        low_text: row.try_get("low_text")?,
    })
}

fn row_to_cluster(row: &sqlx::postgres::PgRow) -> anyhow::Result<Cluster> {
    let keywords: Value = row.try_get("keywords")?;
    let entities: Value = row.try_get("entities")?;
    let status: String = row.try_get("status")?;
    Ok(Cluster {
        id: row.try_get("id")?,
        event_label: row.try_get("event_label")?,
        keywords: string_list_from_json(keywords),
        entities: string_list_from_json(entities),
        category: row.try_get("category")?,
        status: ClusterStatus::from_str(&status),
        source_count: row.try_get("source_count")?,
        top_score: row.try_get("top_score")?,
        created_at: row.try_get("created_at")?,
        last_updated_at: row.try_get("last_updated_at")?,
        published_article_id: row.try_get("published_article_id")?,
    })
}

fn row_to_published_article(row: &sqlx::postgres::PgRow) -> anyhow::Result<PublishedArticle> {
    let bullets_pro: Value = row.try_get("bullets_pro")?;
    let bullets_simple: Value = row.try_get("bullets_simple")?;
    let components: Value = row.try_get("components")?;
    let source_urls: Value = row.try_get("source_urls")?;
    Ok(PublishedArticle {
        id: row.try_get("id")?,
        cluster_id: row.try_get("cluster_id")?,
        title_pro: row.try_get("title_pro")?,
        title_simple: row.try_get("title_simple")?,
        bullets_pro: string_list_from_json(bullets_pro),
        bullets_simple: string_list_from_json(bullets_simple),
        body_pro: row.try_get("body_pro")?,
        body_simple: row.try_get("body_simple")?,
        category: row.try_get("category")?,
        emoji: row.try_get("emoji")?,
        image_url: row.try_get("image_url")?,
        image_attribution: row.try_get("image_attribution")?,
        components: components_from_json(components),
        timeline: row.try_get("timeline")?,
        details: row.try_get("details")?,
        chart: row.try_get("chart")?,
        ai_final_score: row.try_get("ai_final_score")?,
        num_sources: row.try_get("num_sources")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        source_urls: string_list_from_json(source_urls),
    })
}

#[async_trait]
impl FeedsynthDao for FeedsynthDaoImpl {
    fn pool(&self) -> Option<&PgPool> {
        Some(&self.pool)
    }

    async fn insert_source_item(&self, item: &NewSourceItem) -> anyhow::Result<Option<i64>> {
        // Bare `ON CONFLICT DO NOTHING` (no target list) suppresses a violation
        // of *any* unique constraint on the table: url, fingerprint, or the
        // partial (guid, source) index for non-empty guids (spec §3: "Any one
        // collision marks the item a duplicate of an existing row").
        let row = sqlx::query(
            r"
            INSERT INTO source_items
                (url, guid, source, title, description, image_url, author, published_at, fetched_at, fingerprint)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT DO NOTHING
            RETURNING id
            ",
        )
        .bind(&item.url)
        .bind(&item.guid)
        .bind(&item.source)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.image_url)
        .bind(&item.author)
        .bind(item.published_at)
        .bind(item.fetched_at)
        .bind(&item.fingerprint)
        .fetch_optional(&self.pool)
        .await
        .context("failed to insert source item")?;

        Ok(row.map(|r| r.get::<i64, _>("id")))
    }

    async fn get_items_pending_score(&self, limit: i64) -> anyhow::Result<Vec<SourceItem>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM source_items
            WHERE score IS NULL AND image_url IS NOT NULL
            ORDER BY fetched_at ASC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch items pending score")?;

        rows.iter().map(row_to_source_item).collect()
    }

    async fn update_item_score(
        &self,
        id: i64,
        score: i32,
        category: &str,
        emoji: &str,
        approved: bool,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r"
            UPDATE source_items
            SET score = $2, category = $3, emoji = $4, approved = $5
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(score)
        .bind(category)
        .bind(emoji)
        .bind(approved)
        .execute(&self.pool)
        .await
        .context("failed to update item score")?;
        Ok(())
    }

    async fn get_unclustered_approved_items(&self) -> anyhow::Result<Vec<SourceItem>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM source_items
            WHERE approved = TRUE AND cluster_id IS NULL AND consumed = FALSE
            ORDER BY published_at ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch unclustered approved items")?;

        rows.iter().map(row_to_source_item).collect()
    }

    async fn attach_item_to_cluster(&self, item_id: i64, cluster_id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE source_items SET cluster_id = $2 WHERE id = $1")
            .bind(item_id)
            .bind(cluster_id)
            .execute(&self.pool)
            .await
            .context("failed to attach item to cluster")?;
        Ok(())
    }

    async fn get_items_for_cluster(&self, cluster_id: i64) -> anyhow::Result<Vec<SourceItem>> {
        let rows = sqlx::query("SELECT * FROM source_items WHERE cluster_id = $1 ORDER BY score DESC NULLS LAST")
            .bind(cluster_id)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch items for cluster")?;

        rows.iter().map(row_to_source_item).collect()
    }

    async fn update_item_full_text(
        &self,
        id: i64,
        full_text: &str,
        low_text: bool,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE source_items SET full_text = $2, low_text = $3 WHERE id = $1")
            .bind(id)
            .bind(full_text)
            .bind(low_text)
            .execute(&self.pool)
            .await
            .context("failed to update item full text")?;
        Ok(())
    }

    async fn mark_items_consumed(&self, cluster_id: i64) -> anyhow::Result<()> {
        sqlx::query("UPDATE source_items SET consumed = TRUE WHERE cluster_id = $1")
            .bind(cluster_id)
            .execute(&self.pool)
            .await
            .context("failed to mark items consumed")?;
        Ok(())
    }

    async fn close_stale_clusters(
        &self,
        inactivity_window_seconds: i64,
        hard_max_age_seconds: i64,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE clusters
            SET status = 'closed'
            WHERE status = 'active'
              AND (
                last_updated_at < NOW() - make_interval(secs => $1)
                OR created_at < NOW() - make_interval(secs => $2)
              )
            ",
        )
        .bind(inactivity_window_seconds as f64)
        .bind(hard_max_age_seconds as f64)
        .execute(&self.pool)
        .await
        .context("failed to close stale clusters")?;
        Ok(result.rows_affected())
    }

    async fn get_active_clusters(&self, window_seconds: i64) -> anyhow::Result<Vec<Cluster>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM clusters
            WHERE status = 'active' AND last_updated_at >= NOW() - make_interval(secs => $1)
            ",
        )
        .bind(window_seconds as f64)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch active clusters")?;

        rows.iter().map(row_to_cluster).collect()
    }

    async fn get_cluster(&self, cluster_id: i64) -> anyhow::Result<Option<Cluster>> {
        let row = sqlx::query("SELECT * FROM clusters WHERE id = $1")
            .bind(cluster_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch cluster")?;
        row.as_ref().map(row_to_cluster).transpose()
    }

    async fn create_cluster(
        &self,
        event_label: &str,
        keywords: &[String],
        entities: &[String],
        category: Option<&str>,
        top_score: i32,
    ) -> anyhow::Result<i64> {
        let keywords_json = serde_json::to_value(keywords)?;
        let entities_json = serde_json::to_value(entities)?;
        let row = sqlx::query(
            r"
            INSERT INTO clusters
                (event_label, keywords, entities, category, status, source_count, top_score, created_at, last_updated_at)
            VALUES ($1, $2, $3, $4, 'active', 1, $5, NOW(), NOW())
            RETURNING id
            ",
        )
        .bind(event_label)
        .bind(keywords_json)
        .bind(entities_json)
        .bind(category)
        .bind(top_score)
        .fetch_one(&self.pool)
        .await
        .context("failed to create cluster")?;
        Ok(row.get::<i64, _>("id"))
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
        let keywords_json = serde_json::to_value(keywords)?;
        let entities_json = serde_json::to_value(entities)?;
        sqlx::query(
            r"
            UPDATE clusters
            SET keywords = $2, entities = $3, category = $4, source_count = $5,
                top_score = $6, last_updated_at = $7
            WHERE id = $1
            ",
        )
        .bind(cluster_id)
        .bind(keywords_json)
        .bind(entities_json)
        .bind(category)
        .bind(source_count)
        .bind(top_score)
        .bind(last_updated_at)
        .execute(&self.pool)
        .await
        .context("failed to update cluster after match")?;
        Ok(())
    }

    async fn set_cluster_published_article(
        &self,
        cluster_id: i64,
        published_article_id: i64,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE clusters SET published_article_id = $2 WHERE id = $1")
            .bind(cluster_id)
            .bind(published_article_id)
            .execute(&self.pool)
            .await
            .context("failed to set cluster published article")?;
        Ok(())
    }

    async fn get_published_article_by_cluster(
        &self,
        cluster_id: i64,
    ) -> anyhow::Result<Option<PublishedArticle>> {
        let row = sqlx::query("SELECT * FROM published_articles WHERE cluster_id = $1")
            .bind(cluster_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch published article")?;
        row.as_ref().map(row_to_published_article).transpose()
    }

    async fn insert_published_article(
        &self,
        cluster_id: i64,
        content: &ArticleContent,
    ) -> anyhow::Result<i64> {
        let bullets_pro = serde_json::to_value(&content.bullets_pro)?;
        let bullets_simple = serde_json::to_value(&content.bullets_simple)?;
        let components = serde_json::to_value(
            content
                .components
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
        )?;
        let source_urls = serde_json::to_value(&content.source_urls)?;

        let row = sqlx::query(
            r"
            INSERT INTO published_articles
                (cluster_id, title_pro, title_simple, bullets_pro, bullets_simple, body_pro,
                 body_simple, category, emoji, image_url, image_attribution, components,
                 timeline, details, chart, ai_final_score, num_sources, version, source_urls,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, 1,
                    $18, NOW(), NOW())
            RETURNING id
            ",
        )
        .bind(cluster_id)
        .bind(&content.title_pro)
        .bind(&content.title_simple)
        .bind(bullets_pro)
        .bind(bullets_simple)
        .bind(&content.body_pro)
        .bind(&content.body_simple)
        .bind(&content.category)
        .bind(&content.emoji)
        .bind(&content.image_url)
        .bind(&content.image_attribution)
        .bind(components)
        .bind(&content.timeline)
        .bind(&content.details)
        .bind(&content.chart)
        .bind(content.ai_final_score)
        .bind(content.num_sources)
        .bind(source_urls)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert published article")?;
        Ok(row.get::<i64, _>("id"))
    }

    async fn update_published_article(
        &self,
        id: i64,
        content: &ArticleContent,
        new_version: i32,
    ) -> anyhow::Result<()> {
        let bullets_pro = serde_json::to_value(&content.bullets_pro)?;
        let bullets_simple = serde_json::to_value(&content.bullets_simple)?;
        let components = serde_json::to_value(
            content
                .components
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
        )?;
        let source_urls = serde_json::to_value(&content.source_urls)?;

        sqlx::query(
            r"
            UPDATE published_articles
            SET title_pro = $2, title_simple = $3, bullets_pro = $4, bullets_simple = $5,
                body_pro = $6, body_simple = $7, category = $8, emoji = $9, image_url = $10,
                image_attribution = $11, components = $12, timeline = $13, details = $14,
                chart = $15, ai_final_score = $16, num_sources = $17, version = $18,
                source_urls = $19, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&content.title_pro)
        .bind(&content.title_simple)
        .bind(bullets_pro)
        .bind(bullets_simple)
        .bind(&content.body_pro)
        .bind(&content.body_simple)
        .bind(&content.category)
        .bind(&content.emoji)
        .bind(&content.image_url)
        .bind(&content.image_attribution)
        .bind(components)
        .bind(&content.timeline)
        .bind(&content.details)
        .bind(&content.chart)
        .bind(content.ai_final_score)
        .bind(content.num_sources)
        .bind(new_version)
        .bind(source_urls)
        .execute(&self.pool)
        .await
        .context("failed to update published article")?;
        Ok(())
    }

    async fn insert_update_log_entry(
        &self,
        article_id: i64,
        trigger: UpdateTrigger,
        sources_added: i32,
        prev_version: i32,
        new_version: i32,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r"
            INSERT INTO article_updates_log
                (article_id, updated_at, trigger, sources_added, prev_version, new_version)
            VALUES ($1, NOW(), $2, $3, $4, $5)
            ",
        )
        .bind(article_id)
        .bind(trigger.as_str())
        .bind(sources_added)
        .bind(prev_version)
        .bind(new_version)
        .execute(&self.pool)
        .await
        .context("failed to insert update log entry")?;
        Ok(())
    }

    async fn start_cycle(&self) -> anyhow::Result<i64> {
        let row = sqlx::query(
            r"
            INSERT INTO fetch_cycles (started_at, status, feeds_polled, items_new, items_scored,
                items_approved, clusters_affected, articles_published)
            VALUES (NOW(), 'running', 0, 0, 0, 0, 0, 0)
            RETURNING id
            ",
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to start cycle")?;
        Ok(row.get::<i64, _>("id"))
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
        sqlx::query(
            r"
            UPDATE fetch_cycles
            SET finished_at = NOW(), feeds_polled = $2, items_new = $3, items_scored = $4,
                items_approved = $5, clusters_affected = $6, articles_published = $7,
                status = $8, error_text = $9
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(feeds_polled)
        .bind(items_new)
        .bind(items_scored)
        .bind(items_approved)
        .bind(clusters_affected)
        .bind(articles_published)
        .bind(status.as_str())
        .bind(error_text)
        .execute(&self.pool)
        .await
        .context("failed to finish cycle")?;
        Ok(())
    }

    async fn get_recent_cycles(&self, limit: i64) -> anyhow::Result<Vec<FetchCycle>> {
        let rows = sqlx::query("SELECT * FROM fetch_cycles ORDER BY started_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch recent cycles")?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok(FetchCycle {
                    id: row.try_get("id")?,
                    started_at: row.try_get("started_at")?,
                    finished_at: row.try_get("finished_at")?,
                    feeds_polled: row.try_get("feeds_polled")?,
                    items_new: row.try_get("items_new")?,
                    items_scored: row.try_get("items_scored")?,
                    items_approved: row.try_get("items_approved")?,
                    clusters_affected: row.try_get("clusters_affected")?,
                    articles_published: row.try_get("articles_published")?,
                    status: match status.as_str() {
                        "completed" => CycleStatus::Completed,
                        "failed" => CycleStatus::Failed,
                        _ => CycleStatus::Running,
                    },
                    error_text: row.try_get("error_text")?,
                })
            })
            .collect()
    }

    async fn record_feed_success(&self, source: &str) -> anyhow::Result<()> {
        sqlx::query(
            r"
            INSERT INTO feed_health (source, consecutive_failures, last_success_at)
            VALUES ($1, 0, NOW())
            ON CONFLICT (source) DO UPDATE
            SET consecutive_failures = 0, last_success_at = NOW()
            ",
        )
        .bind(source)
        .execute(&self.pool)
        .await
        .context("failed to record feed success")?;
        Ok(())
    }

    async fn record_feed_failure(&self, source: &str, error: &str) -> anyhow::Result<()> {
        sqlx::query(
            r"
            INSERT INTO feed_health (source, consecutive_failures, last_failure_at, last_error)
            VALUES ($1, 1, NOW(), $2)
            ON CONFLICT (source) DO UPDATE
            SET consecutive_failures = feed_health.consecutive_failures + 1,
                last_failure_at = NOW(),
                last_error = $2
            ",
        )
        .bind(source)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("failed to record feed failure")?;
        Ok(())
    }

    async fn get_feed_health(&self, source: &str) -> anyhow::Result<Option<FeedHealth>> {
        let row = sqlx::query("SELECT * FROM feed_health WHERE source = $1")
            .bind(source)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch feed health")?;

        row.map(|row| {
            Ok(FeedHealth {
                source: row.try_get("source")?,
                consecutive_failures: row.try_get("consecutive_failures")?,
                last_success_at: row.try_get("last_success_at")?,
                last_failure_at: row.try_get("last_failure_at")?,
                last_error: row.try_get("last_error")?,
            })
        })
        .transpose()
    }
}
