//! Stage 7: component selection & generation (spec §4.7).

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Value, json};
use tracing::warn;

use crate::pipeline::PipelineContext;
use crate::store::models::ComponentKind;

#[derive(Debug, Clone, Default)]
pub(crate) struct GeneratedComponents {
    pub(crate) components: Vec<ComponentKind>,
    pub(crate) timeline: Option<Value>,
    pub(crate) details: Option<Value>,
    pub(crate) chart: Option<Value>,
}

fn validate_timeline(payload: &Value) -> bool {
    payload
        .get("entries")
        .and_then(Value::as_array)
        .is_some_and(|entries| {
            (2..=4).contains(&entries.len())
                && entries
                    .iter()
                    .all(|e| e.get("date").is_some() && e.get("event").is_some())
        })
}

fn validate_details(payload: &Value) -> bool {
    payload
        .get("facts")
        .and_then(Value::as_array)
        .is_some_and(|facts| facts.len() == 3 && facts.iter().all(Value::is_string))
}

fn validate_chart(payload: &Value) -> bool {
    payload
        .get("points")
        .and_then(Value::as_array)
        .is_some_and(|points| points.len() >= 4)
        && payload.get("x_label").is_some()
        && payload.get("y_label").is_some()
}

fn validate(kind: ComponentKind, payload: &Value) -> bool {
    match kind {
        ComponentKind::Timeline => validate_timeline(payload),
        ComponentKind::Details => validate_details(payload),
        ComponentKind::Chart => validate_chart(payload),
    }
}

fn bundle_for(kind: ComponentKind, bundles: &crate::clients::SearchBundles) -> Value {
    match kind {
        ComponentKind::Timeline => json!({ "entries": bundles.timeline.clone().unwrap_or_default() }),
        ComponentKind::Details => json!({ "facts": bundles.details.clone().unwrap_or_default() }),
        ComponentKind::Chart => bundles
            .chart
            .as_ref()
            .map(|c| json!({ "points": c.points, "x_label": c.x_label, "y_label": c.y_label }))
            .unwrap_or_else(|| json!({ "points": [] })),
    }
}

/// Selects components (falling back to `[details, timeline]`), gathers
/// search bundles, renders each in parallel, and drops any component whose
/// payload fails validation (spec §4.7). Returns `None` when every selected
/// component failed to render or validate, so the caller can defer the
/// cluster's publish this cycle instead of writing an empty component list
/// (spec §3/§8: `components` must be non-empty on every published article).
pub(crate) async fn run(
    ctx: Arc<PipelineContext>,
    title: &str,
    body: &str,
) -> Option<GeneratedComponents> {
    let selected_names = ctx.clients.component_select.select(title, body).await;
    let selected: Vec<ComponentKind> = selected_names
        .iter()
        .filter_map(|name| ComponentKind::parse(name))
        .collect();

    let bundles = match ctx.clients.search.gather(title, body, &selected_names).await {
        Ok(bundles) => bundles,
        Err(error) => {
            warn!(%error, "search capability failed; rendering without bundles");
            crate::clients::SearchBundles::default()
        }
    };

    let renders = join_all(selected.iter().map(|&kind| {
        let ctx = Arc::clone(&ctx);
        let bundle = bundle_for(kind, &bundles);
        async move {
            let result = ctx
                .clients
                .component_render
                .render(kind.as_str(), title, body, &bundle)
                .await;
            (kind, result)
        }
    }))
    .await;

    let mut generated = GeneratedComponents::default();
    for (kind, result) in renders {
        match result {
            Ok(payload) if validate(kind, &payload) => {
                generated.components.push(kind);
                match kind {
                    ComponentKind::Timeline => generated.timeline = Some(payload),
                    ComponentKind::Details => generated.details = Some(payload),
                    ComponentKind::Chart => generated.chart = Some(payload),
                }
            }
            Ok(_) => warn!(component = kind.as_str(), "component payload failed shape validation"),
            Err(error) => warn!(component = kind.as_str(), %error, "component render call failed"),
        }
    }

    if generated.components.is_empty() {
        warn!("every selected component failed to render or validate; deferring cluster publish");
        return None;
    }

    Some(generated)
}
