//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::{ResourceKind, TargetSite};

/// Hard cap on how long navigation may take before we stop waiting (30 s).
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Extra wait after the page settles so lazily loaded bundles are observed.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 5_000;

/// Per-request timeout for resource and map fetches.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Mirror root, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "sources";

/// Where screen recordings land.
pub const DEFAULT_RECORDINGS_DIR: &str = "screenRecordings";

/// Everything a single harvesting run needs to know.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// The site under audit.
    pub site: TargetSite,
    /// Root of the reconstructed mirror (`sources/`).
    pub output_root: PathBuf,
    /// Directory for session recordings.
    pub recordings_dir: PathBuf,
    /// Hard timeout for the navigation settle race.
    pub navigation_timeout: Duration,
    /// Wait after settling before observation closes.
    pub quiet_period: Duration,
    /// Timeout for each HTTP fetch.
    pub fetch_timeout: Duration,
    /// Media types the observer keeps.
    pub tracked: Vec<ResourceKind>,
    /// Capture a video of the browser session.
    pub record: bool,
    /// Browser binary to launch. `None` searches the usual locations.
    pub chromium_path: Option<PathBuf>,
}

impl HarvestConfig {
    /// Create a configuration with default timeouts and output locations.
    pub fn new(site: TargetSite) -> Self {
        Self {
            site,
            output_root: PathBuf::from(DEFAULT_OUTPUT_DIR),
            recordings_dir: PathBuf::from(DEFAULT_RECORDINGS_DIR),
            navigation_timeout: Duration::from_millis(DEFAULT_NAVIGATION_TIMEOUT_MS),
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            tracked: ResourceKind::all(),
            record: false,
            chromium_path: None,
        }
    }

    /// `screenRecordings/screen-recording-<hostname>.mp4`
    pub fn recording_path(&self) -> PathBuf {
        self.recordings_dir
            .join(format!("screen-recording-{}.mp4", self.site.hostname()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let site = TargetSite::parse("https://a.example/").unwrap();
        let config = HarvestConfig::new(site);
        assert_eq!(config.output_root, PathBuf::from("sources"));
        assert_eq!(config.quiet_period, Duration::from_millis(5000));
        assert_eq!(config.tracked.len(), 2);
        assert!(!config.record);
        assert!(config.chromium_path.is_none());
    }

    #[test]
    fn test_recording_path_uses_hostname() {
        let site = TargetSite::parse("https://shop.a.example:8443/cart").unwrap();
        let config = HarvestConfig::new(site);
        assert_eq!(
            config.recording_path(),
            PathBuf::from("screenRecordings/screen-recording-shop.a.example.mp4")
        );
    }
}
