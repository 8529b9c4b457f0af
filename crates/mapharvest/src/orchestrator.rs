//! Run sequencing: discover, then rebuild one resource at a time.
//!
//! Discovery opens an observation window, navigates, waits out the quiet
//! period and freezes the discovered set. Reconstruction then walks that set
//! strictly in order. Each resource ends in a `ResourceOutcome`; a failure in
//! one never stops the batch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::HarvestConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::http_client::HttpClient;
use crate::navigation::{NavigationController, NavigationOutcome};
use crate::observer::{DiscoveredResources, ObservationWindow, ResourceObserver};
use crate::reconstruct::TreeReconstructor;
use crate::renderer::{RenderContext, Renderer};
use crate::resolver::{MapResolver, Resolution, ResolvedMap};
use crate::sourcemap::DecodedMap;
use crate::types::{DiscoveredResource, TargetSite};

/// What one resource's map yielded.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconstructionSummary {
    pub map_url: String,
    /// Original sources written, in declaration order.
    pub written: Vec<PathBuf>,
    /// Declared sources with no inline content.
    pub missing_content: usize,
    /// Writes that failed, sources and compiled body alike.
    pub failed_writes: usize,
    /// Where the compiled body was saved, unless that write failed.
    pub compiled: Option<PathBuf>,
}

/// Result of processing one discovered resource.
#[derive(Debug)]
pub enum ResourceOutcome {
    Reconstructed(ReconstructionSummary),
    /// The resource carried no `sourceMappingURL` comment.
    NoReference,
    Failed(HarvestError),
}

/// Tally of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub discovered: usize,
    pub reconstructed: usize,
    pub no_reference: usize,
    pub failed: usize,
    /// Original sources plus compiled bodies written.
    pub files_written: usize,
    pub sources_without_content: usize,
    pub navigation_failed: bool,
}

impl RunReport {
    pub fn record(&mut self, outcome: &ResourceOutcome) {
        match outcome {
            ResourceOutcome::Reconstructed(summary) => {
                self.reconstructed += 1;
                self.files_written +=
                    summary.written.len() + usize::from(summary.compiled.is_some());
                self.sources_without_content += summary.missing_content;
            }
            ResourceOutcome::NoReference => self.no_reference += 1,
            ResourceOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Resources that produced nothing, for whatever reason.
    pub fn skipped(&self) -> usize {
        self.no_reference + self.failed
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} resources discovered: {} reconstructed, {} without source map, {} failed; {} files written",
            self.discovered, self.reconstructed, self.no_reference, self.failed, self.files_written
        )
    }
}

/// Everything observed during the page lifecycle.
#[derive(Debug)]
pub struct Discovery {
    pub resources: DiscoveredResources,
    pub navigation: NavigationOutcome,
}

/// Open a page, observe it through navigation and the quiet period, and
/// return the frozen resource set.
///
/// Errors only when the browser cannot give us a page to observe. Once a page
/// exists it is always released, whether observation succeeded or not.
pub async fn discover(config: &HarvestConfig, renderer: &dyn Renderer) -> Result<Discovery> {
    let mut ctx = renderer
        .new_context()
        .await
        .context("failed to open a browser page")?;

    if config.record {
        let output = config.recording_path();
        if let Err(e) = ctx.start_recording(&output).await {
            tracing::warn!(error = %format!("{e:#}"), "screen recording disabled");
        }
    }

    let discovery = observe(config, ctx.as_mut()).await;
    release(ctx).await;
    discovery
}

async fn observe(config: &HarvestConfig, ctx: &mut dyn RenderContext) -> Result<Discovery> {
    let responses = ctx
        .subscribe_responses()
        .await
        .context("failed to observe network responses")?;
    let window = ObservationWindow::open(responses, ResourceObserver::new(config.tracked.clone()));

    let controller = NavigationController::new(config.navigation_timeout, config.quiet_period);
    let navigation = controller
        .settle(ctx, config.site.base_url().as_str())
        .await;
    controller.quiet_period().await;

    let resources = window.close().await?;
    tracing::info!(count = resources.len(), "observation closed");

    Ok(Discovery {
        resources,
        navigation,
    })
}

async fn release(mut ctx: Box<dyn RenderContext>) {
    if let Err(e) = ctx.stop_recording().await {
        tracing::warn!(error = %format!("{e:#}"), "failed to finalize screen recording");
    }
    if let Err(e) = ctx.close().await {
        tracing::warn!(error = %format!("{e:#}"), "failed to close browser page");
    }
}

/// Turns discovered resources into mirrored files.
#[derive(Clone)]
pub struct Harvester {
    site: TargetSite,
    resolver: MapResolver,
    reconstructor: TreeReconstructor,
}

impl Harvester {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            site: config.site.clone(),
            resolver: MapResolver::new(HttpClient::new(config.fetch_timeout)),
            reconstructor: TreeReconstructor::new(config.output_root.clone()),
        }
    }

    /// Process every resource in order, one at a time.
    pub async fn reconstruct_all(&self, resources: &DiscoveredResources) -> RunReport {
        let mut report = RunReport {
            discovered: resources.len(),
            ..Default::default()
        };

        for resource in resources {
            let outcome = self.process(resource).await;
            report.record(&outcome);
        }
        report
    }

    /// Resolve, decode and write one resource. Never panics, never propagates.
    pub async fn process(&self, resource: &DiscoveredResource) -> ResourceOutcome {
        tracing::info!(url = %resource.url, kind = %resource.kind, "processing");

        match self.resolver.resolve(&resource.url).await {
            Ok(Resolution::NoReference) => {
                tracing::warn!(url = %resource.url, "no source map reference found");
                ResourceOutcome::NoReference
            }
            Ok(Resolution::Found(resolved)) => match self.rebuild(&resolved) {
                Ok(summary) => {
                    tracing::info!(
                        url = %resource.url,
                        written = summary.written.len(),
                        missing = summary.missing_content,
                        "source map processed"
                    );
                    ResourceOutcome::Reconstructed(summary)
                }
                Err(e) => {
                    tracing::warn!(url = %resource.url, error = %e, "failed to rebuild sources");
                    ResourceOutcome::Failed(e)
                }
            },
            Err(e) => {
                tracing::warn!(url = %resource.url, error = %e, "failed to resolve source map");
                ResourceOutcome::Failed(e)
            }
        }
    }

    fn rebuild(&self, resolved: &ResolvedMap) -> HarvestResult<ReconstructionSummary> {
        let map = DecodedMap::from_payload(&resolved.payload)?;
        let mut summary = ReconstructionSummary {
            map_url: resolved.reference.map_url.to_string(),
            ..Default::default()
        };

        for source in map.sources() {
            let content = match map.source_content_for(source) {
                Some(content) => content,
                None => {
                    tracing::debug!(source = %source, "no inline content, skipping");
                    summary.missing_content += 1;
                    continue;
                }
            };

            match self.reconstructor.write(&self.site, source, content) {
                Ok(file) => summary.written.push(file.destination),
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "failed to write source");
                    summary.failed_writes += 1;
                }
            }
        }

        match self.reconstructor.write_compiled(
            &self.site,
            &resolved.reference.resource_url,
            &resolved.resource_body,
        ) {
            Ok(file) => summary.compiled = Some(file.destination),
            Err(e) => {
                tracing::warn!(
                    url = %resolved.reference.resource_url,
                    error = %e,
                    "failed to write compiled body"
                );
                summary.failed_writes += 1;
            }
        }
        Ok(summary)
    }
}

/// Full run: discover with the browser, then rebuild every resource.
pub async fn harvest(config: &HarvestConfig, renderer: &dyn Renderer) -> Result<RunReport> {
    let discovery = discover(config, renderer).await?;
    let mut report = Harvester::new(config)
        .reconstruct_all(&discovery.resources)
        .await;
    report.navigation_failed = !discovery.navigation.is_settled();
    Ok(report)
}
