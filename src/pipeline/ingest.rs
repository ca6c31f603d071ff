//! Stage 1: ingest (spec §4.1).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::pipeline::PipelineContext;
use crate::store::models::{FeedDescriptor, NewSourceItem};
use crate::util::time::is_plausible_published_at;
use crate::util::url::canonicalize;

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<img[^>]+src=["']([^"']+)["']"#).unwrap());

#[derive(Debug, Default)]
pub(crate) struct IngestOutcome {
    pub(crate) feeds_polled: i32,
    pub(crate) items_new: i32,
}

fn fingerprint(title: &str, source: &str) -> String {
    let normalized_title: String = title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized_title.as_bytes());
    hasher.update(b"|");
    hasher.update(source.to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn extract_image_url(entry: &feed_rs::model::Entry) -> Option<String> {
    for media in &entry.media {
        if let Some(content) = media.content.iter().find(|c| c.url.is_some()) {
            return content.url.as_ref().map(ToString::to_string);
        }
    }
    for media in &entry.media {
        if let Some(thumb) = media.thumbnails.first() {
            return Some(thumb.image.uri.clone());
        }
    }
    for link in &entry.links {
        let is_image = link
            .media_type
            .as_deref()
            .is_some_and(|mime| mime.starts_with("image/"));
        if is_image {
            return Some(link.href.clone());
        }
    }
    let html = entry
        .summary
        .as_ref()
        .map(|t| t.content.as_str())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))
        .unwrap_or("");
    IMG_TAG.captures(html).map(|cap| cap[1].to_string())
}

fn plain_excerpt(entry: &feed_rs::model::Entry) -> Option<String> {
    let html = entry
        .summary
        .as_ref()
        .map(|t| t.content.as_str())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))?;
    let text = html2text::from_read(html.as_bytes(), 2000).ok()?;
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() { None } else { Some(collapsed) }
}

async fn poll_one_feed(
    http: &Client,
    ctx: &PipelineContext,
    descriptor: &FeedDescriptor,
) -> anyhow::Result<i32> {
    let body = http
        .get(&descriptor.url)
        .timeout(ctx.config.feed_poll_timeout())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let feed = feed_rs::parser::parse(&body[..])?;
    let now = Utc::now();
    let mut new_items = 0;

    for entry in &feed.entries {
        let Some(raw_link) = entry.links.first().map(|l| l.href.clone()) else {
            continue;
        };
        let Some(canonical_url) = canonicalize(&raw_link) else {
            continue;
        };
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_default();
        if title.trim().is_empty() {
            continue;
        }
        let published_at = entry.published.or(entry.updated).unwrap_or(now);
        if !is_plausible_published_at(published_at, now) {
            continue;
        }

        let item = NewSourceItem {
            url: canonical_url,
            guid: Some(entry.id.clone()).filter(|g| !g.is_empty()),
            source: descriptor.source.clone(),
            title: title.clone(),
            description: plain_excerpt(entry),
            image_url: extract_image_url(entry).and_then(|raw| canonicalize(&raw)),
            author: entry.authors.first().map(|a| a.name.clone()),
            published_at,
            fetched_at: now,
            fingerprint: fingerprint(&title, &descriptor.source),
        };

        if ctx.dao.insert_source_item(&item).await?.is_some() {
            new_items += 1;
        }
    }

    Ok(new_items)
}

/// Polls every feed concurrently (bounded by `ingest_concurrency`). A
/// failing feed never fails the stage (spec §4.1); its failure is logged and
/// tracked per-source.
pub(crate) async fn run(ctx: Arc<PipelineContext>, feeds: &[FeedDescriptor]) -> IngestOutcome {
    let http = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_default();
    let concurrency = ctx.config.ingest_concurrency();

    let results: Vec<(String, anyhow::Result<i32>)> = stream::iter(feeds.iter().cloned())
        .map(|descriptor| {
            let http = http.clone();
            let ctx = Arc::clone(&ctx);
            async move {
                let result = poll_one_feed(&http, &ctx, &descriptor).await;
                (descriptor.source.clone(), result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = IngestOutcome::default();
    for (source, result) in results {
        outcome.feeds_polled += 1;
        match result {
            Ok(new_items) => {
                outcome.items_new += new_items;
                ctx.metrics.items_ingested.inc_by(f64::from(new_items));
                if let Err(error) = ctx.dao.record_feed_success(&source).await {
                    warn!(%source, %error, "failed to record feed success");
                }
            }
            Err(error) => {
                warn!(%source, %error, "feed poll failed");
                if let Err(record_error) = ctx.dao.record_feed_failure(&source, &error.to_string()).await {
                    warn!(%source, %record_error, "failed to record feed failure");
                }
            }
        }
    }
    ctx.metrics.feeds_polled.inc_by(f64::from(outcome.feeds_polled));
    info!(feeds_polled = outcome.feeds_polled, items_new = outcome.items_new, "ingest complete");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_case_and_whitespace_insensitive() {
        let a = fingerprint("  ECB   Raises Rates ", "Reuters");
        let b = fingerprint("ecb raises rates", "reuters");
        assert_eq!(a, b);
    }

    #[test]
    fn extracts_first_img_src_from_html() {
        let html = r#"<p>intro</p><img src="https://example.com/x.jpg" alt="a"><img src="https://example.com/y.jpg">"#;
        let cap = IMG_TAG.captures(html).unwrap();
        assert_eq!(&cap[1], "https://example.com/x.jpg");
    }
}
