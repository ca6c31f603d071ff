//! Wire types for the six external capability contracts (spec §6).
//!
//! Each capability is a typed request/response pair rather than runtime-typed
//! JSON bouncing between stages (REDESIGN FLAGS: "dynamic provider dispatch").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ScoreRequest<'a> {
    pub(crate) title: &'a str,
    pub(crate) source: &'a str,
    pub(crate) excerpt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScoreResponse {
    pub(crate) score: i32,
    pub(crate) category: String,
    pub(crate) emoji: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub(crate) reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FetchMethod {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FetchResponse {
    pub(crate) text: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub(crate) content_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub(crate) title: &'a str,
    pub(crate) body_excerpt: &'a str,
    pub(crate) components: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TimelineEntry {
    pub(crate) date: String,
    pub(crate) event: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChartPoint {
    pub(crate) date: String,
    pub(crate) value: f64,
    #[serde(default)]
    pub(crate) label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChartBundle {
    pub(crate) points: Vec<ChartPoint>,
    pub(crate) x_label: String,
    pub(crate) y_label: String,
}

/// Search results, keyed by component name (spec §4.7/§6). Fields are
/// optional because the search capability only returns a bundle for the
/// components it was asked about.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SearchBundles {
    #[serde(default)]
    pub(crate) timeline: Option<Vec<TimelineEntry>>,
    #[serde(default)]
    pub(crate) details: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) chart: Option<ChartBundle>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SourcePackage<'a> {
    pub(crate) publisher: &'a str,
    pub(crate) title: &'a str,
    pub(crate) published_at: DateTime<Utc>,
    pub(crate) text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SynthesisRequest<'a> {
    pub(crate) sources: &'a [SourcePackage<'a>],
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SynthesisResponse {
    pub(crate) title_pro: String,
    pub(crate) title_simple: String,
    pub(crate) bullets_pro: Vec<String>,
    pub(crate) bullets_simple: Vec<String>,
    pub(crate) body_pro: String,
    pub(crate) body_simple: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ComponentSelectionRequest<'a> {
    pub(crate) title: &'a str,
    pub(crate) body: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ComponentSelectionResponse {
    #[serde(default)]
    pub(crate) components: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub(crate) emoji: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub(crate) chart_subtype: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ComponentRenderRequest<'a> {
    pub(crate) component: &'a str,
    pub(crate) article_title: &'a str,
    pub(crate) article_body: &'a str,
    pub(crate) bundle: &'a serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ComponentRenderResponse {
    pub(crate) payload: serde_json::Value,
}
