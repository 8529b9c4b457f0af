//! Mapharvest — audit a live site for leaked source maps and rebuild the
//! original source tree they expose.
//!
//! The pipeline runs in two phases. Discovery drives a browser to the target
//! URL and records every script and stylesheet the page loads. Reconstruction
//! walks that frozen set one resource at a time: fetch the body, follow its
//! `sourceMappingURL`, decode the map and write each inline source under
//! `sources/<hostname>/`.

pub mod config;
pub mod error;
pub mod http_client;
pub mod navigation;
pub mod observer;
pub mod orchestrator;
pub mod reconstruct;
pub mod renderer;
pub mod resolver;
pub mod sourcemap;
pub mod types;

pub use config::HarvestConfig;
pub use error::{HarvestError, HarvestResult};
pub use orchestrator::{discover, harvest, Harvester, ResourceOutcome, RunReport};
pub use renderer::chromium::ChromiumRenderer;
pub use renderer::{ObservedResponse, RenderContext, Renderer, ResponseStream, SettleSignal};
pub use sourcemap::DecodedMap;
pub use types::*;
