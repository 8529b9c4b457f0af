//! Chromium-based renderer using chromiumoxide.

use super::recording::{self, FrameEncoder};
use super::{ObservedResponse, RenderContext, Renderer, ResponseStream, SettleSignal};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::browser_protocol::page::{
    EventDomContentEventFired, EventLifecycleEvent, EventLoadEventFired, EventScreencastFrame,
    ScreencastFrameAckParams, SetLifecycleEventsEnabledParams, StartScreencastFormat,
    StartScreencastParams, StopScreencastParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

/// Environment variable pointing at a Chromium/Chrome binary.
pub const CHROMIUM_PATH_ENV: &str = "MAPHARVEST_CHROMIUM_PATH";

/// Lifecycle event name Chromium uses for "no network activity for 500ms".
const NETWORK_IDLE: &str = "networkIdle";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. MAPHARVEST_CHROMIUM_PATH env
    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Pick the browser binary: an explicit path wins and must exist, otherwise
/// fall back to `find_chromium`.
pub fn select_executable(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) if path.exists() => Ok(Some(path.to_path_buf())),
        Some(path) => bail!("Chromium not found at {}", path.display()),
        None => Ok(find_chromium()),
    }
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance, from `executable` when given.
    ///
    /// Falls back to chromiumoxide's own executable detection when no path
    /// is given and `find_chromium` comes up empty.
    pub async fn launch(executable: Option<&Path>) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        match select_executable(executable)? {
            Some(path) => builder = builder.chrome_executable(path),
            None => tracing::debug!("no Chromium found on PATH, using chromiumoxide detection"),
        }

        let config = builder
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!(error = %e, "browser handler event error");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        Ok(Box::new(ChromiumContext {
            page,
            recording: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.context("failed to close Chromium")?;
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

struct ActiveRecording {
    stop: oneshot::Sender<()>,
    forwarder: JoinHandle<()>,
    encoder: FrameEncoder,
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    recording: Option<ActiveRecording>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn subscribe_responses(&mut self) -> Result<ResponseStream> {
        let events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to network responses")?;

        let responses = events.map(|event| ObservedResponse {
            url: event.response.url.clone(),
            content_type: Some(event.response.mime_type.clone()).filter(|m| !m.is_empty()),
        });
        Ok(responses.boxed())
    }

    async fn navigate(&mut self, url: &str) -> Result<SettleSignal> {
        let mut loaded = self
            .page
            .event_listener::<EventLoadEventFired>()
            .await
            .context("failed to subscribe to load events")?;
        let mut dom_ready = self
            .page
            .event_listener::<EventDomContentEventFired>()
            .await
            .context("failed to subscribe to DOMContentLoaded events")?;
        let mut lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .context("failed to subscribe to lifecycle events")?;
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .context("failed to enable lifecycle events")?;

        let network_idle = async {
            while let Some(event) = lifecycle.next().await {
                if event.name == NETWORK_IDLE {
                    return;
                }
            }
            futures::future::pending::<()>().await
        };

        tokio::select! {
            nav = self.page.goto(url) => {
                nav.with_context(|| format!("navigation to {url} failed"))?;
                Ok(SettleSignal::Load)
            }
            Some(_) = loaded.next() => Ok(SettleSignal::Load),
            Some(_) = dom_ready.next() => Ok(SettleSignal::DomContentLoaded),
            _ = network_idle => Ok(SettleSignal::NetworkIdle),
        }
    }

    async fn start_recording(&mut self, output: &Path) -> Result<()> {
        if self.recording.is_some() {
            bail!("recording already in progress");
        }

        let encoder = FrameEncoder::spawn(output)?;
        let mut frames = self
            .page
            .event_listener::<EventScreencastFrame>()
            .await
            .context("failed to subscribe to screencast frames")?;

        self.page
            .execute(StartScreencastParams {
                format: Some(StartScreencastFormat::Jpeg),
                quality: Some(80),
                ..Default::default()
            })
            .await
            .context("failed to start screencast")?;

        let page = self.page.clone();
        let sink = encoder.sender();
        let (stop, mut stopped) = oneshot::channel::<()>();

        let forwarder = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    frame = frames.next() => {
                        let Some(frame) = frame else { break };
                        let _ = page
                            .execute(ScreencastFrameAckParams::new(frame.session_id))
                            .await;
                        let data: &str = AsRef::<str>::as_ref(&frame.data);
                        match recording::decode_frame(data) {
                            Some(bytes) => {
                                if sink.send(bytes).await.is_err() {
                                    break;
                                }
                            }
                            None => tracing::debug!("dropping undecodable screencast frame"),
                        }
                    }
                }
            }
        });

        self.recording = Some(ActiveRecording {
            stop,
            forwarder,
            encoder,
        });
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        let Some(recording) = self.recording.take() else {
            return Ok(());
        };

        let _ = self.page.execute(StopScreencastParams::default()).await;
        let _ = recording.stop.send(());
        let _ = recording.forwarder.await;

        let path = recording.encoder.finish().await?;
        tracing::info!(path = %path.display(), "saved screen recording");
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        if let Err(e) = self.stop_recording().await {
            tracing::warn!(error = %e, "failed to finalize screen recording");
        }
        let _ = self.page.close().await;
        Ok(())
    }
}
