//! Operator-facing control plane (spec SPEC_FULL.md §B). Health, metrics,
//! and an admin trigger/listing — none of this is part of the eight-stage
//! core, but it is the ambient surface the teacher always ships next to a
//! pipeline binary.

pub(crate) mod admin;
pub(crate) mod health;
pub(crate) mod metrics;

use axum::{
    Router,
    routing::{get, post},
};

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/metrics", get(metrics::exporter))
        .route("/admin/run-cycle", post(admin::run_cycle))
        .route("/admin/cycles", get(admin::recent_cycles))
        .with_state(state)
}
