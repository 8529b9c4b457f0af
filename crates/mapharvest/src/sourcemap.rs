//! Source map payload decoding.
//!
//! Only the parts of the v3 format needed to recover original files are read:
//! `sourceRoot`, `sources`, `sourcesContent` and the `sections` of indexed
//! maps. Mappings are ignored entirely.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::HarvestResult;

/// Anti-XSSI prefix some servers put in front of map payloads.
const XSSI_PREFIX: &str = ")]}'";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    sources_content: Vec<Option<String>>,
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    // Sections referencing a remote `url` instead of an embedded map are skipped.
    #[serde(default)]
    map: Option<RawSourceMap>,
}

/// A decoded map: declared sources in order, plus any inline content.
#[derive(Debug, Clone, Default)]
pub struct DecodedMap {
    sources: Vec<String>,
    contents: HashMap<String, String>,
}

impl DecodedMap {
    /// Decode a raw JSON payload.
    pub fn from_payload(payload: &str) -> HarvestResult<Self> {
        let trimmed = payload.trim_start_matches('\u{feff}').trim_start();
        let json = match trimmed.strip_prefix(XSSI_PREFIX) {
            Some(rest) => rest.split_once('\n').map_or(rest, |(_, r)| r),
            None => trimmed,
        };

        let raw: RawSourceMap = serde_json::from_str(json)?;
        let mut decoded = Self::default();
        decoded.absorb(raw);
        Ok(decoded)
    }

    fn absorb(&mut self, raw: RawSourceMap) {
        let root = raw.source_root.unwrap_or_default();

        for (i, source) in raw.sources.into_iter().enumerate() {
            let Some(source) = source else { continue };
            let path = apply_source_root(&root, &source);
            // Empty strings carry nothing to recover.
            let content = raw
                .sources_content
                .get(i)
                .cloned()
                .flatten()
                .filter(|c| !c.is_empty());

            if !self.contents.contains_key(&path) {
                if let Some(content) = content {
                    self.contents.insert(path.clone(), content);
                }
            }
            self.sources.push(path);
        }

        for section in raw.sections {
            if let Some(map) = section.map {
                self.absorb(map);
            }
        }
    }

    /// Declared source paths, in declaration order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Inline content for `source`, or `None` when the map does not embed it
    /// (or embeds an empty string).
    pub fn source_content_for(&self, source: &str) -> Option<&str> {
        self.contents.get(source).map(|s| s.as_str())
    }
}

fn apply_source_root(root: &str, source: &str) -> String {
    if root.is_empty() || source.starts_with('/') || source.contains("://") {
        return source.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), source)
}
