//! Loads the static feed descriptor list (spec §6: "static configuration of
//! feed descriptors") from the JSON file named by `FEEDSYNTH_FEEDS_CONFIG_PATH`.

use anyhow::Context;

use crate::store::models::FeedDescriptor;

pub(crate) fn load_feed_descriptors(path: &str) -> anyhow::Result<Vec<FeedDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read feeds config at {path}"))?;
    let descriptors: Vec<FeedDescriptor> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse feeds config at {path}"))?;
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_well_formed_feed_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[{{"source": "Reuters", "url": "https://reuters.com/rss", "tier": 1}}]"#
        )
        .unwrap();

        let descriptors = load_feed_descriptors(file.path().to_str().unwrap()).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].source, "Reuters");
        assert_eq!(descriptors[0].tier, 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_feed_descriptors("/nonexistent/feeds.json").is_err());
    }
}
