//! Resource observation during the page lifecycle.
//!
//! A `ResourceObserver` is the single writer of the discovered set. An
//! `ObservationWindow` drives it from the browser's response stream on a
//! background task until the window is closed, at which point the set is
//! frozen into an immutable, ordered `DiscoveredResources`.

use std::collections::HashSet;

use futures::{FutureExt, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{HarvestError, HarvestResult};
use crate::renderer::{ObservedResponse, ResponseStream};
use crate::types::{DiscoveredResource, ResourceKind};

/// Collects script and stylesheet URLs, deduplicated and in first-seen order.
#[derive(Debug)]
pub struct ResourceObserver {
    tracked: Vec<ResourceKind>,
    seen: HashSet<String>,
    resources: Vec<DiscoveredResource>,
}

impl ResourceObserver {
    pub fn new(tracked: Vec<ResourceKind>) -> Self {
        Self {
            tracked,
            seen: HashSet::new(),
            resources: Vec::new(),
        }
    }

    /// Record one network response. Returns `true` if the URL was newly added.
    pub fn on_response(&mut self, url: &str, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };
        let Some(kind) = ResourceKind::from_content_type(content_type) else {
            return false;
        };
        if !self.tracked.contains(&kind) {
            return false;
        }
        if !self.seen.insert(url.to_string()) {
            return false;
        }

        tracing::debug!(url = %url, kind = %kind, "observed resource");
        self.resources.push(DiscoveredResource {
            url: url.to_string(),
            content_type: content_type.to_string(),
            kind,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Stop observing and hand out the final set.
    pub fn freeze(self) -> DiscoveredResources {
        DiscoveredResources {
            resources: self.resources,
        }
    }
}

/// The frozen discovered set. Read-only by construction.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredResources {
    resources: Vec<DiscoveredResource>,
}

impl DiscoveredResources {
    pub fn iter(&self) -> std::slice::Iter<'_, DiscoveredResource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.url.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a DiscoveredResources {
    type Item = &'a DiscoveredResource;
    type IntoIter = std::slice::Iter<'a, DiscoveredResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

/// An open observation period feeding a `ResourceObserver` in the background.
pub struct ObservationWindow {
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<ResourceObserver>,
}

impl ObservationWindow {
    /// Start draining `responses` into `observer`.
    pub fn open(mut responses: ResponseStream, mut observer: ResourceObserver) -> Self {
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => break,
                    next = responses.next() => match next {
                        Some(resp) => record(&mut observer, &resp),
                        None => {
                            // Stream ended early; hold the window until closed.
                            let _ = close_rx.await;
                            return observer;
                        }
                    },
                }
            }

            // Admit anything that arrived before the close signal was seen.
            while let Some(Some(resp)) = responses.next().now_or_never() {
                record(&mut observer, &resp);
            }
            observer
        });

        Self { close_tx, task }
    }

    /// Close the window and freeze the discovered set.
    pub async fn close(self) -> HarvestResult<DiscoveredResources> {
        let _ = self.close_tx.send(());
        let observer = self
            .task
            .await
            .map_err(|e| HarvestError::Observation(format!("observer task failed: {e}")))?;
        Ok(observer.freeze())
    }
}

fn record(observer: &mut ResourceObserver, resp: &ObservedResponse) {
    observer.on_response(&resp.url, resp.content_type.as_deref());
}
