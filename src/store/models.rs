//! Row-shaped domain types shared by the DAO and the pipeline stages.
//!
//! `UpdateLogEntry` and `ClusterMatch` round out the model for callers that
//! want a typed read of an update-log row or a cluster-match outcome; the
//! current DAO/clustering code passes the same information as loose
//! parameters and return tuples instead, so these have no caller yet.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One article from one publisher (spec §3).
#[derive(Debug, Clone)]
pub(crate) struct SourceItem {
    pub(crate) id: i64,
    pub(crate) url: String,
    pub(crate) guid: Option<String>,
    pub(crate) source: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) full_text: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) published_at: DateTime<Utc>,
    pub(crate) fetched_at: DateTime<Utc>,
    pub(crate) score: Option<i32>,
    pub(crate) category: Option<String>,
    pub(crate) emoji: Option<String>,
    pub(crate) approved: bool,
    pub(crate) consumed: bool,
    pub(crate) cluster_id: Option<i64>,
    pub(crate) fingerprint: String,
    pub(crate) low_text: bool,
}

/// A brand-new item staged by the ingest stage, before it has a row id.
#[derive(Debug, Clone)]
pub(crate) struct NewSourceItem {
    pub(crate) url: String,
    pub(crate) guid: Option<String>,
    pub(crate) source: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) published_at: DateTime<Utc>,
    pub(crate) fetched_at: DateTime<Utc>,
    pub(crate) fingerprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClusterStatus {
    Active,
    Closed,
}

impl ClusterStatus {
    #[must_use]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ClusterStatus::Active => "active",
            ClusterStatus::Closed => "closed",
        }
    }

    #[must_use]
    pub(crate) fn from_str(s: &str) -> Self {
        match s {
            "closed" => ClusterStatus::Closed,
            _ => ClusterStatus::Active,
        }
    }
}

/// A live event grouping of one or more `SourceItem`s (spec §3).
#[derive(Debug, Clone)]
pub(crate) struct Cluster {
    pub(crate) id: i64,
    pub(crate) event_label: String,
    pub(crate) keywords: Vec<String>,
    pub(crate) entities: Vec<String>,
    pub(crate) category: Option<String>,
    pub(crate) status: ClusterStatus,
    pub(crate) source_count: i32,
    pub(crate) top_score: Option<i32>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_updated_at: DateTime<Utc>,
    pub(crate) published_article_id: Option<i64>,
}

/// The ordered, optional sections a published article may carry (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ComponentKind {
    Timeline,
    Details,
    Chart,
}

impl ComponentKind {
    #[must_use]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Timeline => "timeline",
            ComponentKind::Details => "details",
            ComponentKind::Chart => "chart",
        }
    }

    #[must_use]
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "timeline" => Some(ComponentKind::Timeline),
            "details" => Some(ComponentKind::Details),
            "chart" => Some(ComponentKind::Chart),
            _ => None,
        }
    }
}

/// One synthesised record per cluster (spec §3).
#[derive(Debug, Clone)]
pub(crate) struct PublishedArticle {
    pub(crate) id: i64,
    pub(crate) cluster_id: i64,
    pub(crate) title_pro: String,
    pub(crate) title_simple: String,
    pub(crate) bullets_pro: Vec<String>,
    pub(crate) bullets_simple: Vec<String>,
    pub(crate) body_pro: String,
    pub(crate) body_simple: String,
    pub(crate) category: Option<String>,
    pub(crate) emoji: String,
    pub(crate) image_url: Option<String>,
    pub(crate) image_attribution: Option<String>,
    pub(crate) components: Vec<ComponentKind>,
    pub(crate) timeline: Option<Value>,
    pub(crate) details: Option<Value>,
    pub(crate) chart: Option<Value>,
    pub(crate) ai_final_score: i32,
    pub(crate) num_sources: i32,
    pub(crate) version: i32,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) source_urls: Vec<String>,
}

/// A fully-assembled article body, prior to assignment of an id/version
/// (publish decides insert vs. update).
#[derive(Debug, Clone)]
pub(crate) struct ArticleContent {
    pub(crate) title_pro: String,
    pub(crate) title_simple: String,
    pub(crate) bullets_pro: Vec<String>,
    pub(crate) bullets_simple: Vec<String>,
    pub(crate) body_pro: String,
    pub(crate) body_simple: String,
    pub(crate) category: Option<String>,
    pub(crate) emoji: String,
    pub(crate) image_url: Option<String>,
    pub(crate) image_attribution: Option<String>,
    pub(crate) components: Vec<ComponentKind>,
    pub(crate) timeline: Option<Value>,
    pub(crate) details: Option<Value>,
    pub(crate) chart: Option<Value>,
    pub(crate) ai_final_score: i32,
    pub(crate) num_sources: i32,
    pub(crate) source_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateTrigger {
    Initial,
    NewHighScore,
    Volume,
}

impl UpdateTrigger {
    #[must_use]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            UpdateTrigger::Initial => "initial",
            UpdateTrigger::NewHighScore => "new_high_score",
            UpdateTrigger::Volume => "volume",
        }
    }
}

/// Observability row recording one publish/republish event (spec §3, optional).
#[derive(Debug, Clone)]
pub(crate) struct UpdateLogEntry {
    pub(crate) id: i64,
    pub(crate) article_id: i64,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) trigger: UpdateTrigger,
    pub(crate) sources_added: i32,
    pub(crate) prev_version: i32,
    pub(crate) new_version: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleStatus {
    Running,
    Completed,
    Failed,
}

impl CycleStatus {
    #[must_use]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Running => "running",
            CycleStatus::Completed => "completed",
            CycleStatus::Failed => "failed",
        }
    }
}

/// One `fetch_cycles` row: the per-cycle ledger used by the operator API and
/// `fetch_cycles` status annotations (spec §6, §7).
#[derive(Debug, Clone)]
pub(crate) struct FetchCycle {
    pub(crate) id: i64,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) feeds_polled: i32,
    pub(crate) items_new: i32,
    pub(crate) items_scored: i32,
    pub(crate) items_approved: i32,
    pub(crate) clusters_affected: i32,
    pub(crate) articles_published: i32,
    pub(crate) status: CycleStatus,
    pub(crate) error_text: Option<String>,
}

/// Per-feed running failure counter (spec §4.1: "operators can observe
/// degraded sources"). Not a named table in §6; persisted alongside the
/// cycle ledger so ingest failures survive process restarts.
#[derive(Debug, Clone)]
pub(crate) struct FeedHealth {
    pub(crate) source: String,
    pub(crate) consecutive_failures: i32,
    pub(crate) last_success_at: Option<DateTime<Utc>>,
    pub(crate) last_failure_at: Option<DateTime<Utc>>,
    pub(crate) last_error: Option<String>,
}

/// A single feed descriptor from the static ingest configuration (spec §6).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FeedDescriptor {
    pub(crate) source: String,
    pub(crate) url: String,
    pub(crate) tier: u8,
}

/// Outcome of matching a candidate item against the open-cluster set (§4.3).
#[derive(Debug, Clone)]
pub(crate) enum ClusterMatch {
    Existing { cluster_id: i64, score: f64 },
    New,
}
