//! Canonical URL normalization (spec §4.1): the same article reached via
//! different tracking parameters must fold to the same identity.

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use url::Url;

static TRACKING_PREFIXES: &[&str] = &["utm_"];

static TRACKING_PARAMS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    ["gclid", "fbclid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src"]
        .into_iter()
        .collect()
});

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    TRACKING_PREFIXES.iter().any(|p| lower.starts_with(p)) || TRACKING_PARAMS.contains(lower.as_str())
}

/// Normalizes a raw feed-entry link into the canonical form used for
/// dedup/identity. Returns `None` for links that don't parse as an absolute
/// (or protocol-relative) URL.
#[must_use]
pub(crate) fn canonicalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let with_scheme = if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        trimmed.to_string()
    };

    let mut parsed = Url::parse(&with_scheme).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }

    if let Some(host) = parsed.host_str() {
        let lower_host = host.to_ascii_lowercase();
        parsed.set_host(Some(&lower_host)).ok()?;
    }

    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if retained.is_empty() {
        parsed.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &retained {
            serializer.append_pair(k, v);
        }
        parsed.set_query(Some(&serializer.finish()));
    }

    parsed.set_fragment(None);

    let mut result = parsed.to_string();
    if result.ends_with('/') && parsed.path() == "/" && parsed.query().is_none() {
        result.pop();
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utm_and_known_tracking_params() {
        let raw = "https://example.com/a/b?utm_source=x&utm_medium=y&gclid=abc&id=1";
        assert_eq!(
            canonicalize(raw).as_deref(),
            Some("https://example.com/a/b?id=1")
        );
    }

    #[test]
    fn drops_fragment() {
        assert_eq!(
            canonicalize("https://example.com/a#section-2").as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn lowercases_host() {
        assert_eq!(
            canonicalize("https://Example.COM/Path").as_deref(),
            Some("https://example.com/Path")
        );
    }

    #[test]
    fn resolves_protocol_relative_links() {
        assert_eq!(
            canonicalize("//example.com/story").as_deref(),
            Some("https://example.com/story")
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert_eq!(canonicalize("ftp://example.com/a"), None);
        assert_eq!(canonicalize("not a url"), None);
    }

    #[test]
    fn strips_trailing_slash_on_bare_root() {
        assert_eq!(
            canonicalize("https://example.com/").as_deref(),
            Some("https://example.com")
        );
    }
}
