//! Navigation with a bounded settle race.
//!
//! `settle` returns on the first of load, DOMContentLoaded, network idle or
//! the hard timeout. Navigation errors are logged and swallowed: resources may
//! already have loaded before the failure, so the run carries on with what the
//! observer has seen.

use std::time::Duration;

use crate::renderer::{RenderContext, SettleSignal};

/// Outcome of a settle attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Settled(SettleSignal),
    /// Navigation errored; the message is kept for reporting.
    Failed(String),
}

impl NavigationOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}

/// Drives a render context to the target URL.
#[derive(Debug, Clone)]
pub struct NavigationController {
    hard_timeout: Duration,
    quiet_period: Duration,
}

impl NavigationController {
    pub fn new(hard_timeout: Duration, quiet_period: Duration) -> Self {
        Self {
            hard_timeout,
            quiet_period,
        }
    }

    /// Navigate and wait for the first completion signal or the hard timeout.
    ///
    /// Never fails; errors come back as `NavigationOutcome::Failed`.
    pub async fn settle(&self, ctx: &mut dyn RenderContext, url: &str) -> NavigationOutcome {
        tracing::info!(url = %url, timeout_ms = self.hard_timeout.as_millis() as u64, "navigating");

        match tokio::time::timeout(self.hard_timeout, ctx.navigate(url)).await {
            Ok(Ok(signal)) => {
                tracing::info!(url = %url, signal = %signal, "page settled");
                NavigationOutcome::Settled(signal)
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %format!("{e:#}"), "navigation failed, continuing with observed resources");
                NavigationOutcome::Failed(format!("{e:#}"))
            }
            Err(_) => {
                tracing::warn!(
                    url = %url,
                    timeout_ms = self.hard_timeout.as_millis() as u64,
                    "navigation hit the hard timeout, continuing with observed resources"
                );
                NavigationOutcome::Settled(SettleSignal::HardTimeout)
            }
        }
    }

    /// Wait out the quiet period so late, lazily loaded resources are seen.
    pub async fn quiet_period(&self) {
        if self.quiet_period.is_zero() {
            return;
        }
        tracing::debug!(ms = self.quiet_period.as_millis() as u64, "waiting for lazy resources");
        tokio::time::sleep(self.quiet_period).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::ResponseStream;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::path::Path;

    enum Behaviour {
        Signal(SettleSignal),
        Error,
        Hang,
    }

    struct StubContext(Behaviour);

    #[async_trait]
    impl RenderContext for StubContext {
        async fn subscribe_responses(&mut self) -> Result<ResponseStream> {
            bail!("unused")
        }
        async fn navigate(&mut self, _url: &str) -> Result<SettleSignal> {
            match self.0 {
                Behaviour::Signal(s) => Ok(s),
                Behaviour::Error => bail!("net::ERR_NAME_NOT_RESOLVED"),
                Behaviour::Hang => futures::future::pending().await,
            }
        }
        async fn start_recording(&mut self, _output: &Path) -> Result<()> {
            Ok(())
        }
        async fn stop_recording(&mut self) -> Result<()> {
            Ok(())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn controller() -> NavigationController {
        NavigationController::new(Duration::from_secs(30), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_settle_reports_first_signal() {
        let mut ctx = StubContext(Behaviour::Signal(SettleSignal::DomContentLoaded));
        let outcome = controller().settle(&mut ctx, "https://a.example/").await;
        assert_eq!(
            outcome,
            NavigationOutcome::Settled(SettleSignal::DomContentLoaded)
        );
    }

    #[tokio::test]
    async fn test_settle_swallows_navigation_errors() {
        let mut ctx = StubContext(Behaviour::Error);
        let outcome = controller().settle(&mut ctx, "https://a.example/").await;
        match outcome {
            NavigationOutcome::Failed(msg) => assert!(msg.contains("ERR_NAME_NOT_RESOLVED")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_hard_timeout_never_hangs() {
        let mut ctx = StubContext(Behaviour::Hang);
        let outcome = controller().settle(&mut ctx, "https://a.example/").await;
        assert_eq!(outcome, NavigationOutcome::Settled(SettleSignal::HardTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_waits() {
        let start = tokio::time::Instant::now();
        controller().quiet_period().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
