//! Local mirror of a site's original source tree.
//!
//! Layout: `<root>/<site-hostname>/<url-path>`. Original sources are placed
//! by resolving their declared path against the site's base URL; compiled
//! bodies use the path of the resource's own URL. Existing files are
//! overwritten, so the last write to a destination wins.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{HarvestError, HarvestResult};
use crate::types::{ReconstructedFile, TargetSite};

/// File name used when a URL path ends in `/`.
const INDEX_FILE: &str = "index";

/// Writes recovered files under a mirror root.
#[derive(Debug, Clone)]
pub struct TreeReconstructor {
    root: PathBuf,
}

impl TreeReconstructor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding everything recovered for `site`.
    pub fn site_dir(&self, site: &TargetSite) -> PathBuf {
        self.root.join(site.hostname())
    }

    /// Where an original source declared as `source_path` ends up.
    pub fn source_destination(
        &self,
        site: &TargetSite,
        source_path: &str,
    ) -> HarvestResult<PathBuf> {
        let resolved =
            site.base_url()
                .join(source_path)
                .map_err(|source| HarvestError::InvalidUrl {
                    url: source_path.to_string(),
                    source,
                })?;
        Ok(mirror_path(&self.site_dir(site), &resolved))
    }

    /// Where the compiled body of `resource_url` ends up.
    pub fn compiled_destination(&self, site: &TargetSite, resource_url: &Url) -> PathBuf {
        mirror_path(&self.site_dir(site), resource_url)
    }

    /// Write one recovered original source.
    pub fn write(
        &self,
        site: &TargetSite,
        source_path: &str,
        content: &str,
    ) -> HarvestResult<ReconstructedFile> {
        let destination = self.source_destination(site, source_path)?;
        persist(&destination, content)
    }

    /// Write the compiled body of a resource next to its recovered sources.
    pub fn write_compiled(
        &self,
        site: &TargetSite,
        resource_url: &Url,
        body: &str,
    ) -> HarvestResult<ReconstructedFile> {
        let destination = self.compiled_destination(site, resource_url);
        persist(&destination, body)
    }
}

/// Map a URL's path onto `site_dir`, dropping empty and dot segments.
fn mirror_path(site_dir: &Path, url: &Url) -> PathBuf {
    let mut path = site_dir.to_path_buf();
    let mut pushed = false;
    let mut trailing_slash = false;

    let segments: Vec<&str> = match url.path_segments() {
        Some(segments) => segments.collect(),
        None => url.path().split('/').collect(),
    };

    for segment in segments {
        trailing_slash = segment.is_empty();
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        path.push(segment);
        pushed = true;
    }

    if !pushed || trailing_slash {
        path.push(INDEX_FILE);
    }
    path
}

fn persist(destination: &Path, content: &str) -> HarvestResult<ReconstructedFile> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HarvestError::io(parent, e))?;
    }
    std::fs::write(destination, content).map_err(|e| HarvestError::io(destination, e))?;

    tracing::debug!(path = %destination.display(), bytes = content.len(), "wrote file");
    Ok(ReconstructedFile {
        destination: destination.to_path_buf(),
        bytes: content.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> TargetSite {
        TargetSite::parse("https://a.example/").unwrap()
    }

    #[test]
    fn test_source_destination_resolves_against_site_base() {
        let rec = TreeReconstructor::new("sources");
        assert_eq!(
            rec.source_destination(&site(), "../src/app.ts").unwrap(),
            PathBuf::from("sources/a.example/src/app.ts")
        );
        assert_eq!(
            rec.source_destination(&site(), "webpack:///./src/index.js")
                .unwrap(),
            PathBuf::from("sources/a.example/src/index.js")
        );
    }

    #[test]
    fn test_source_destination_stays_under_site_dir() {
        let rec = TreeReconstructor::new("sources");
        let dest = rec
            .source_destination(&site(), "../../../../etc/passwd")
            .unwrap();
        assert_eq!(dest, PathBuf::from("sources/a.example/etc/passwd"));
    }

    #[test]
    fn test_source_destination_uses_site_hostname_for_foreign_urls() {
        let rec = TreeReconstructor::new("sources");
        let dest = rec
            .source_destination(&site(), "https://cdn.other/lib/x.js")
            .unwrap();
        assert_eq!(dest, PathBuf::from("sources/a.example/lib/x.js"));
    }

    #[test]
    fn test_compiled_destination_uses_resource_path() {
        let rec = TreeReconstructor::new("sources");
        let url = Url::parse("https://a.example/static/js/main.js?v=3").unwrap();
        assert_eq!(
            rec.compiled_destination(&site(), &url),
            PathBuf::from("sources/a.example/static/js/main.js")
        );
    }

    #[test]
    fn test_trailing_slash_maps_to_index() {
        let rec = TreeReconstructor::new("sources");
        let url = Url::parse("https://a.example/assets/").unwrap();
        assert_eq!(
            rec.compiled_destination(&site(), &url),
            PathBuf::from("sources/a.example/assets/index")
        );
    }

    #[test]
    fn test_write_creates_directories_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let rec = TreeReconstructor::new(dir.path().join("sources"));

        let first = rec.write(&site(), "../src/app.ts", "old").unwrap();
        let second = rec.write(&site(), "src/app.ts", "const x = 1;").unwrap();

        assert_eq!(first.destination, second.destination);
        assert_eq!(second.bytes, 12);
        let written = std::fs::read_to_string(&second.destination).unwrap();
        assert_eq!(written, "const x = 1;");
    }

    #[test]
    fn test_write_compiled() {
        let dir = tempfile::tempdir().unwrap();
        let rec = TreeReconstructor::new(dir.path());
        let url = Url::parse("https://a.example/app/bundle.js").unwrap();

        let file = rec.write_compiled(&site(), &url, "!function(){}()").unwrap();
        assert_eq!(
            file.destination,
            dir.path().join("a.example").join("app").join("bundle.js")
        );
        assert_eq!(
            std::fs::read_to_string(file.destination).unwrap(),
            "!function(){}()"
        );
    }
}
