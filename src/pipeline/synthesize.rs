//! Stage 6: synthesise (spec §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::clients::{SourcePackage, SynthesisResponse};
use crate::pipeline::PipelineContext;
use crate::store::models::SourceItem;
use crate::util::retry::RetryConfig;

#[derive(Debug, Clone)]
pub(crate) struct SynthesisDraft {
    pub(crate) title_pro: String,
    pub(crate) title_simple: String,
    pub(crate) bullets_pro: Vec<String>,
    pub(crate) bullets_simple: Vec<String>,
    pub(crate) body_pro: String,
    pub(crate) body_simple: String,
    pub(crate) category: Option<String>,
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

fn paragraph_count(s: &str) -> usize {
    s.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}

fn bullets_valid(bullets: &[String]) -> bool {
    bullets.len() == 3 && bullets.iter().all(|b| (18..=25).contains(&word_count(b)))
}

fn body_valid(body: &str) -> bool {
    (220..=280).contains(&word_count(body)) && paragraph_count(body) == 5
}

fn validate(response: &SynthesisResponse) -> Result<(), &'static str> {
    if !bullets_valid(&response.bullets_pro) {
        return Err("bullets_pro out of range");
    }
    if !bullets_valid(&response.bullets_simple) {
        return Err("bullets_simple out of range");
    }
    if !body_valid(&response.body_pro) {
        return Err("body_pro out of range");
    }
    if !body_valid(&response.body_simple) {
        return Err("body_simple out of range");
    }
    if response.title_pro.trim().is_empty() || response.title_simple.trim().is_empty() {
        return Err("missing a register title");
    }
    Ok(())
}

fn majority_category(items: &[SourceItem]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        if let Some(category) = item.category.as_deref() {
            *counts.entry(category).or_insert(0) += 1;
        }
    }
    counts.into_iter().max_by_key(|(_, count)| *count).map(|(c, _)| c.to_string())
}

/// Packages a cluster's members into source packages (descending score,
/// truncated), calls the synthesis capability, validates the result, and
/// retries on invalid output up to three times with exponential backoff
/// (spec §4.6). Returns `Ok(None)` when synthesis should be deferred.
pub(crate) async fn run(
    ctx: Arc<PipelineContext>,
    items: &[SourceItem],
) -> anyhow::Result<Option<SynthesisDraft>> {
    let max_sources = ctx.config.synthesis_max_sources();
    let char_cap = ctx.config.synthesis_source_char_cap();

    let mut ordered = items.to_vec();
    ordered.sort_by(|a, b| b.score.unwrap_or(0).cmp(&a.score.unwrap_or(0)));

    let mut chosen: Vec<&SourceItem> = ordered.iter().filter(|i| !i.low_text).take(max_sources).collect();
    if chosen.len() < 2 {
        for item in &ordered {
            if chosen.len() >= 2 || chosen.len() >= max_sources {
                break;
            }
            if !chosen.iter().any(|c| c.id == item.id) {
                chosen.push(item);
            }
        }
    }

    if chosen.is_empty() {
        return Ok(None);
    }

    let texts: Vec<String> = chosen
        .iter()
        .map(|item| {
            let text = item.full_text.as_deref().or(item.description.as_deref()).unwrap_or("");
            text.chars().take(char_cap).collect()
        })
        .collect();

    let packages: Vec<SourcePackage<'_>> = chosen
        .iter()
        .zip(texts.iter())
        .map(|(item, text)| SourcePackage {
            publisher: &item.source,
            title: &item.title,
            published_at: item.published_at,
            text,
        })
        .collect();

    let retry = RetryConfig::default();
    let mut attempt = 0usize;
    loop {
        let delay = retry.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match ctx.clients.synthesis.synthesize(&packages).await {
            Ok(response) => match validate(&response) {
                Ok(()) => {
                    return Ok(Some(SynthesisDraft {
                        title_pro: response.title_pro,
                        title_simple: response.title_simple,
                        bullets_pro: response.bullets_pro,
                        bullets_simple: response.bullets_simple,
                        body_pro: response.body_pro,
                        body_simple: response.body_simple,
                        category: majority_category(&ordered),
                    }));
                }
                Err(reason) => {
                    attempt += 1;
                    ctx.metrics.capability_retries.inc();
                    warn!(attempt, reason, "synthesis output failed validation");
                    if !retry.can_retry(attempt) {
                        warn!("synthesis exhausted retries; deferring cluster");
                        return Ok(None);
                    }
                }
            },
            Err(error) => {
                attempt += 1;
                ctx.metrics.capability_retries.inc();
                warn!(attempt, %error, "synthesis call failed");
                if !retry.can_retry(attempt) {
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullet_of_exactly_18_words_is_valid() {
        let bullet = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen seventeen eighteen".to_string();
        assert_eq!(word_count(&bullet), 18);
        assert!(bullets_valid(&[bullet.clone(), bullet.clone(), bullet]));
    }

    #[test]
    fn bullet_of_17_words_is_invalid() {
        let bullet = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen sixteen seventeen".to_string();
        assert_eq!(word_count(&bullet), 17);
        assert!(!bullets_valid(&[bullet.clone(), bullet.clone(), bullet]));
    }
}
