//! `GET /health/live` and `GET /health/ready` (SPEC_FULL.md §B).

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Sticky readiness flag: once the store pool has served one successful
/// `SELECT 1`, readiness stays true for the life of the process (a later
/// transient DB hiccup does not flip `/health/ready` back to unready — the
/// scheduler's own retry/backoff handles that at the stage level).
static STORE_READY: AtomicBool = AtomicBool::new(false);

pub(crate) async fn live() -> Json<HealthReport> {
    Json(HealthReport {
        status: "live",
        detail: None,
    })
}

pub(crate) async fn ready(
    State(state): State<AppState>,
) -> Result<Json<HealthReport>, (StatusCode, Json<HealthReport>)> {
    if STORE_READY.load(Ordering::Acquire) {
        return Ok(Json(HealthReport {
            status: "ready",
            detail: None,
        }));
    }

    match state.dao().pool() {
        None => {
            // Mock/test DAOs carry no pool; treat absence of a pool as
            // trivially ready rather than permanently unready.
            STORE_READY.store(true, Ordering::Release);
            Ok(Json(HealthReport {
                status: "ready",
                detail: None,
            }))
        }
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => {
                STORE_READY.store(true, Ordering::Release);
                Ok(Json(HealthReport {
                    status: "ready",
                    detail: None,
                }))
            }
            Err(error) => {
                error!(%error, "readiness probe failed: store pool unreachable");
                Err((
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(HealthReport {
                        status: "degraded",
                        detail: Some(format!("store: {error}")),
                    }),
                ))
            }
        },
    }
}
