//! Core data types shared by the harvesting pipeline.

use std::path::PathBuf;

use url::Url;

use crate::error::{HarvestError, HarvestResult};

/// The site being audited. Immutable for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSite {
    base_url: Url,
    hostname: String,
}

impl TargetSite {
    /// Parse a fully-qualified `http://` or `https://` URL.
    pub fn parse(raw: &str) -> HarvestResult<Self> {
        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            return Err(HarvestError::InvalidTarget(format!(
                "{raw}: please provide a full URL including the protocol (http:// or https://)"
            )));
        }

        let base_url =
            Url::parse(raw).map_err(|e| HarvestError::InvalidTarget(format!("{raw}: {e}")))?;

        let hostname = base_url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| HarvestError::InvalidTarget(format!("{raw}: URL has no host")))?
            .to_string();

        Ok(Self { base_url, hostname })
    }

    /// Base URL that anchors source path resolution.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Hostname, used as the mirror's top-level directory.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

impl std::fmt::Display for TargetSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base_url)
    }
}

/// Media types the observer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Script,
    Stylesheet,
}

impl ResourceKind {
    /// Classify a declared content type such as `application/javascript; charset=utf-8`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.to_ascii_lowercase();
        if ct.contains("javascript") || ct.contains("ecmascript") {
            Some(Self::Script)
        } else if ct.contains("text/css") {
            Some(Self::Stylesheet)
        } else {
            None
        }
    }

    /// Every kind the harvester knows about.
    pub fn all() -> Vec<Self> {
        vec![Self::Script, Self::Stylesheet]
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Script => write!(f, "script"),
            Self::Stylesheet => write!(f, "stylesheet"),
        }
    }
}

/// A script or stylesheet observed while the page loaded.
///
/// Identity is the URL string alone.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
    pub url: String,
    pub content_type: String,
    pub kind: ResourceKind,
}

impl PartialEq for DiscoveredResource {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for DiscoveredResource {}

/// A resource together with the absolute URL of the map it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapReference {
    /// URL of the compiled script or stylesheet.
    pub resource_url: Url,
    /// Map URL, resolved against `resource_url`.
    pub map_url: Url,
}

impl SourceMapReference {
    /// True when the map is embedded as a `data:` URI rather than hosted.
    pub fn is_inline(&self) -> bool {
        self.map_url.scheme() == "data"
    }
}

/// A file written into the local mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedFile {
    pub destination: PathBuf,
    pub bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_site_parse() {
        let site = TargetSite::parse("https://a.example/app/").unwrap();
        assert_eq!(site.hostname(), "a.example");
        assert_eq!(site.base_url().as_str(), "https://a.example/app/");
    }

    #[test]
    fn test_target_site_requires_scheme() {
        assert!(matches!(
            TargetSite::parse("a.example"),
            Err(HarvestError::InvalidTarget(_))
        ));
        assert!(TargetSite::parse("ftp://a.example/").is_err());
    }

    #[test]
    fn test_target_site_rejects_garbage() {
        assert!(TargetSite::parse("https://").is_err());
        assert!(TargetSite::parse("http://exa mple.com").is_err());
    }

    #[test]
    fn test_resource_kind_classification() {
        assert_eq!(
            ResourceKind::from_content_type("application/javascript; charset=utf-8"),
            Some(ResourceKind::Script)
        );
        assert_eq!(
            ResourceKind::from_content_type("text/javascript"),
            Some(ResourceKind::Script)
        );
        assert_eq!(
            ResourceKind::from_content_type("Text/CSS"),
            Some(ResourceKind::Stylesheet)
        );
        assert_eq!(ResourceKind::from_content_type("text/html"), None);
        assert_eq!(ResourceKind::from_content_type("image/png"), None);
    }

    #[test]
    fn test_discovered_resource_identity_is_url() {
        let a = DiscoveredResource {
            url: "https://a.example/app.js".into(),
            content_type: "application/javascript".into(),
            kind: ResourceKind::Script,
        };
        let b = DiscoveredResource {
            url: "https://a.example/app.js".into(),
            content_type: "text/javascript".into(),
            kind: ResourceKind::Script,
        };
        assert_eq!(a, b);
    }
}
