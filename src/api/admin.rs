//! `POST /admin/run-cycle` and `GET /admin/cycles` (SPEC_FULL.md §B).

use axum::{extract::Query, extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::AppState;
use crate::store::models::FetchCycle;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 200;

/// Triggers an out-of-band cycle. Returns immediately; the cycle runs on
/// the scheduler's normal single-flight execution path, so this can never
/// overlap a timer-driven cycle already in flight.
pub(crate) async fn run_cycle(State(state): State<AppState>) -> impl IntoResponse {
    state.scheduler().request_cycle();
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecentCyclesQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FetchCycleView {
    id: i64,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    feeds_polled: i32,
    items_new: i32,
    items_scored: i32,
    items_approved: i32,
    clusters_affected: i32,
    articles_published: i32,
    status: &'static str,
    error_text: Option<String>,
}

impl From<FetchCycle> for FetchCycleView {
    fn from(row: FetchCycle) -> Self {
        Self {
            id: row.id,
            started_at: row.started_at,
            finished_at: row.finished_at,
            feeds_polled: row.feeds_polled,
            items_new: row.items_new,
            items_scored: row.items_scored,
            items_approved: row.items_approved,
            clusters_affected: row.clusters_affected,
            articles_published: row.articles_published,
            status: row.status.as_str(),
            error_text: row.error_text,
        }
    }
}

pub(crate) async fn recent_cycles(
    State(state): State<AppState>,
    Query(query): Query<RecentCyclesQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match state.dao().get_recent_cycles(limit).await {
        Ok(rows) => {
            let views: Vec<FetchCycleView> = rows.into_iter().map(FetchCycleView::from).collect();
            Json(views).into_response()
        }
        Err(error) => {
            warn!(%error, "failed to load recent cycles");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
