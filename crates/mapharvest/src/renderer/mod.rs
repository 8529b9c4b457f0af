//! Renderer abstraction for browser-based page loading.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;
pub mod recording;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A network response seen by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub url: String,
    /// Declared content type (MIME type), when the browser reports one.
    pub content_type: Option<String>,
}

/// Stream of responses for the lifetime of a context.
pub type ResponseStream = BoxStream<'static, ObservedResponse>;

/// Which signal ended the settle race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleSignal {
    /// The document `load` event fired.
    Load,
    /// `DOMContentLoaded` fired.
    DomContentLoaded,
    /// The network went idle.
    NetworkIdle,
    /// None of the above before the hard timeout.
    HardTimeout,
}

impl std::fmt::Display for SettleSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::DomContentLoaded => write!(f, "DOMContentLoaded"),
            Self::NetworkIdle => write!(f, "network idle"),
            Self::HardTimeout => write!(f, "hard timeout"),
        }
    }
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Subscribe to every network response this context receives from now on.
    async fn subscribe_responses(&mut self) -> Result<ResponseStream>;
    /// Navigate to `url` and return as soon as the first of load,
    /// DOMContentLoaded or network-idle fires. Callers bound this with a
    /// hard timeout.
    async fn navigate(&mut self, url: &str) -> Result<SettleSignal>;
    /// Start capturing a video of the session into `output`.
    async fn start_recording(&mut self, output: &Path) -> Result<()>;
    /// Stop capturing and finalize the video file.
    async fn stop_recording(&mut self) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}
