//! Keyword/entity extraction and title similarity (spec §4.3).
//!
//! Clustering compares candidate items against open clusters along three
//! axes: keyword-set Jaccard, entity-set Jaccard, and normalized-title
//! character-trigram cosine similarity. This module is the shared
//! implementation all three draw on.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use unicode_segmentation::UnicodeSegmentation;

static STOP_WORDS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "of", "in", "on", "at", "to", "for", "with", "by",
        "from", "as", "is", "are", "was", "were", "be", "been", "being", "this", "that", "these",
        "those", "it", "its", "his", "her", "their", "our", "your", "my", "not", "no", "has",
        "have", "had", "will", "would", "could", "should", "can", "may", "might", "do", "does",
        "did", "into", "over", "after", "before", "about", "than", "then", "so", "if", "up",
        "out", "says", "said", "new",
    ]
    .into_iter()
    .collect()
});

fn ascii_fold_lower(word: &str) -> String {
    word.chars().flat_map(|c| c.to_lowercase()).collect()
}

/// Splits on non-alphanumeric boundaries, retaining the original casing of
/// each run so callers can distinguish capitalized tokens for entity
/// extraction.
fn raw_word_tokens(s: &str) -> Vec<&str> {
    s.unicode_word_indices()
        .map(|(_, w)| w)
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .collect()
}

/// Keyword set: lower-cased tokens of length >= 3, or fully numeric tokens
/// of length >= 2, with stop words removed (spec §4.3).
#[must_use]
pub(crate) fn keyword_set(title: &str, excerpt: &str) -> FxHashSet<String> {
    let combined = format!("{title} {excerpt}");
    let mut set = FxHashSet::default();
    for token in raw_word_tokens(&combined) {
        let lower = ascii_fold_lower(token);
        let is_numeric = lower.chars().all(|c| c.is_ascii_digit());
        let qualifies = (is_numeric && lower.len() >= 2) || (!is_numeric && lower.len() >= 3);
        if qualifies && !STOP_WORDS.contains(lower.as_str()) {
            set.insert(lower);
        }
    }
    set
}

/// Entity set: tokens (or runs of consecutive tokens) that are capitalized
/// in the original title and not the first word of the title (spec §4.3).
#[must_use]
pub(crate) fn entity_set(title: &str) -> FxHashSet<String> {
    let tokens = raw_word_tokens(title);
    let mut entities = FxHashSet::default();
    let mut current: Vec<&str> = Vec::new();

    for (idx, token) in tokens.iter().enumerate() {
        let starts_upper = token
            .chars()
            .next()
            .is_some_and(char::is_uppercase);
        let sentence_initial = idx == 0;

        if starts_upper && !sentence_initial {
            current.push(token);
        } else {
            if !current.is_empty() {
                entities.insert(ascii_fold_lower(&current.join(" ")));
            }
            current.clear();
        }
    }
    if !current.is_empty() {
        entities.insert(ascii_fold_lower(&current.join(" ")));
    }
    entities
}

/// Lower-case, strip punctuation, collapse whitespace (spec §4.3).
#[must_use]
pub(crate) fn normalized_title(title: &str) -> String {
    let tokens = raw_word_tokens(title);
    tokens
        .iter()
        .map(|t| ascii_fold_lower(t))
        .collect::<Vec<_>>()
        .join(" ")
}

#[must_use]
pub(crate) fn jaccard_similarity(a: &FxHashSet<String>, b: &FxHashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).collect::<HashSet<_>>().len();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn char_trigrams(s: &str) -> FxHashMap<String, u32> {
    let chars: Vec<char> = s.chars().collect();
    let mut grams: FxHashMap<String, u32> = FxHashMap::default();
    if chars.len() < 3 {
        if !chars.is_empty() {
            *grams.entry(chars.iter().collect()).or_insert(0) += 1;
        }
        return grams;
    }
    for window in chars.windows(3) {
        let gram: String = window.iter().collect();
        *grams.entry(gram).or_insert(0) += 1;
    }
    grams
}

/// Character-trigram cosine similarity on normalized titles, bounded to
/// `[0, 1]` (spec §4.3).
#[must_use]
pub(crate) fn title_similarity(normalized_a: &str, normalized_b: &str) -> f64 {
    if normalized_a.is_empty() && normalized_b.is_empty() {
        return 0.0;
    }
    let grams_a = char_trigrams(normalized_a);
    let grams_b = char_trigrams(normalized_b);

    let mut dot = 0.0_f64;
    for (gram, count_a) in &grams_a {
        if let Some(count_b) = grams_b.get(gram) {
            dot += f64::from(*count_a) * f64::from(*count_b);
        }
    }

    let norm_a: f64 = grams_a.values().map(|c| f64::from(*c).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = grams_b.values().map(|c| f64::from(*c).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_set_drops_stop_words_and_short_tokens() {
        let kw = keyword_set("The Fed raises rates", "Officials cite inflation at 8%");
        assert!(kw.contains("raises"));
        assert!(kw.contains("rates"));
        assert!(kw.contains("inflation"));
        assert!(!kw.contains("the"));
        assert!(!kw.contains("at"));
    }

    #[test]
    fn keyword_set_keeps_short_numeric_tokens() {
        let kw = keyword_set("Dow falls 10 points", "");
        assert!(kw.contains("10"));
    }

    #[test]
    fn entity_set_excludes_sentence_initial_capital() {
        let entities = entity_set("Fed Chair Powell Speaks On Rates");
        assert!(!entities.contains("fed"));
        assert!(entities.contains("chair powell"));
    }

    #[test]
    fn entity_set_groups_consecutive_capitalized_tokens() {
        let entities = entity_set("Markets react as New York Stock Exchange reopens");
        assert!(entities.contains("new york stock exchange"));
    }

    #[test]
    fn normalized_title_collapses_punctuation() {
        assert_eq!(
            normalized_title("Fed's Rate Hike: What It Means!"),
            "fed s rate hike what it means"
        );
    }

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a: FxHashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();
        assert_eq!(jaccard_similarity(&a, &a.clone()), 1.0);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a: FxHashSet<String> = ["a".to_string()].into_iter().collect();
        let b: FxHashSet<String> = ["b".to_string()].into_iter().collect();
        assert_eq!(jaccard_similarity(&a, &b), 0.0);
    }

    #[test]
    fn title_similarity_of_identical_titles_is_one() {
        let t = normalized_title("Fed Raises Interest Rates Again");
        assert!((title_similarity(&t, &t) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn title_similarity_of_unrelated_titles_is_low() {
        let a = normalized_title("Fed Raises Interest Rates Again");
        let b = normalized_title("Local Bakery Wins Pastry Award");
        assert!(title_similarity(&a, &b) < 0.3);
    }
}
