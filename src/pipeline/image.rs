//! Stage 5: representative image selection (spec §4.5).

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pipeline::PipelineContext;
use crate::store::models::SourceItem;

static DIMENSIONS_IN_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{2,4})x(\d{2,4})").unwrap());

#[derive(Debug, Clone)]
pub(crate) struct SelectedImage {
    pub(crate) url: String,
    pub(crate) attribution: String,
}

fn dimensions_score(url: &str) -> (f64, Option<(u32, u32)>) {
    let Some(captures) = DIMENSIONS_IN_URL.captures(url) else {
        return (10.0, None);
    };
    let (Ok(w), Ok(h)) = (captures[1].parse::<u32>(), captures[2].parse::<u32>()) else {
        return (10.0, None);
    };
    let area = u64::from(w) * u64::from(h);
    let score = if area >= 800 * 600 {
        30.0
    } else if area >= 400 * 300 {
        20.0
    } else {
        10.0
    };
    (score, Some((w, h)))
}

fn aspect_ratio_score(dimensions: Option<(u32, u32)>) -> f64 {
    match dimensions {
        Some((w, h)) if h > 0 => {
            let ratio = f64::from(w) / f64::from(h);
            if (1.3..=2.0).contains(&ratio) { 20.0 } else { 10.0 }
        }
        _ => 10.0,
    }
}

fn format_score(url: &str) -> f64 {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") || lower.ends_with(".webp") {
        5.0
    } else if lower.ends_with(".png") {
        3.0
    } else {
        0.0
    }
}

fn reputation_score(tier: u8) -> f64 {
    match tier {
        1 => 30.0,
        2 => 20.0,
        3 => 10.0,
        _ => 0.0,
    }
}

fn item_score_normalized(score: Option<i32>) -> f64 {
    f64::from(score.unwrap_or(0)).clamp(0.0, 1000.0) / 1000.0 * 20.0
}

fn candidate_score(item: &SourceItem, tier: u8, image_url: &str) -> f64 {
    let (dim_score, dimensions) = dimensions_score(image_url);
    reputation_score(tier)
        + dim_score
        + aspect_ratio_score(dimensions)
        + item_score_normalized(item.score)
        + format_score(image_url)
}

/// Picks the strongest image across an affected cluster's members by the
/// multi-factor score in spec §4.5, breaking ties by earliest `published_at`.
pub(crate) fn select(ctx: &PipelineContext, items: &[SourceItem]) -> Option<SelectedImage> {
    let mut best: Option<(f64, &SourceItem, String)> = None;
    for item in items {
        let Some(image_url) = &item.image_url else { continue };
        let tier = ctx.tier_for(&item.source);
        let score = candidate_score(item, tier, image_url);

        let replace = match &best {
            None => true,
            Some((best_score, best_item, _)) => {
                score > *best_score
                    || ((score - *best_score).abs() < f64::EPSILON && item.published_at < best_item.published_at)
            }
        };
        if replace {
            best = Some((score, item, image_url.clone()));
        }
    }
    best.map(|(_, item, url)| SelectedImage {
        url,
        attribution: item.source.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_larger_inferred_dimensions() {
        let (small, _) = dimensions_score("https://example.com/200x150.jpg");
        let (large, _) = dimensions_score("https://example.com/1200x800.jpg");
        assert!(large > small);
    }

    #[test]
    fn jpg_scores_higher_than_unknown_suffix() {
        assert!(format_score("https://example.com/a.jpg") > format_score("https://example.com/a"));
    }

    #[test]
    fn aspect_ratio_within_range_scores_higher() {
        let wide = aspect_ratio_score(Some((1600, 1000)));
        let square = aspect_ratio_score(Some((600, 600)));
        assert!(wide > square);
    }
}
