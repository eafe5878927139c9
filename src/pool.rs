//! Bounded-concurrency download pool with relay rotation.
//!
//! Every batch runs its items through `buffer_unordered(workers)`; each in-flight
//! item leases one relay from the batch's window and returns it when done, so two
//! concurrently running tasks never present the same relay. A failing item is
//! logged and yields `None`; it never cancels its siblings and is not retried.

use crate::error::Result;
use crate::fetcher::Relay;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Round-robin source of relay endpoints shared by all batches of a downloader
#[derive(Debug, Default)]
pub struct RelayRotation {
    relays: Vec<Relay>,
    cursor: AtomicUsize,
}

impl RelayRotation {
    /// Create a rotation over the given relays (may be empty)
    pub fn new(relays: Vec<Relay>) -> Self {
        Self {
            relays,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of relays
    pub fn len(&self) -> usize {
        self.relays.len()
    }

    /// Whether no relays are configured
    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Next single relay, advancing the cursor
    pub fn next_relay(&self) -> Option<Relay> {
        self.window(1).pop()
    }

    /// Up to `size` distinct relays starting at the cursor; the cursor advances by one
    pub fn window(&self, size: usize) -> Vec<Relay> {
        if self.relays.is_empty() {
            return Vec::new();
        }
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        let len = self.relays.len();
        (0..size.min(len))
            .map(|offset| self.relays[(start + offset) % len].clone())
            .collect()
    }
}

/// Bounded-concurrency scheduler for fetch tasks
#[derive(Clone, Debug)]
pub struct DownloadPool {
    rotation: Arc<RelayRotation>,
    workers: usize,
}

impl DownloadPool {
    /// Create a pool; `workers` is clamped to the relay count when relays exist
    pub fn new(rotation: Arc<RelayRotation>, workers: usize) -> Self {
        Self { rotation, workers }
    }

    /// Shared relay rotation
    pub fn rotation(&self) -> &Arc<RelayRotation> {
        &self.rotation
    }

    /// Number of tasks that may be in flight at once
    pub fn workers(&self) -> usize {
        let workers = self.workers.max(1);
        if self.rotation.is_empty() {
            workers
        } else {
            workers.min(self.rotation.len())
        }
    }

    /// Run `task` for every item and wait for all of them.
    ///
    /// Results come back in item order; `None` marks an item whose task failed.
    pub async fn downloads<T, R, F, Fut>(&self, label: &str, items: Vec<T>, task: F) -> Vec<Option<R>>
    where
        F: Fn(T, Option<Relay>) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = self.workers().min(total);

        // Leased from the back; reversed so the first task gets the window start
        let mut window = self.rotation.window(workers);
        window.reverse();
        let free = Mutex::new(window);

        tracing::debug!(batch = label, total, workers, "starting download batch");

        let task = &task;
        let free = &free;
        let finished: Vec<(usize, Option<R>)> = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move {
                let relay = free.lock().unwrap_or_else(PoisonError::into_inner).pop();
                let outcome = task(item, relay.clone()).await;
                let relay_name = relay.as_ref().map(Relay::to_string);
                if let Some(relay) = relay {
                    free.lock().unwrap_or_else(PoisonError::into_inner).push(relay);
                }
                match outcome {
                    Ok(value) => (index, Some(value)),
                    Err(e) => {
                        tracing::warn!(
                            batch = label,
                            index,
                            relay = ?relay_name,
                            error = %e,
                            "download task failed"
                        );
                        (index, None)
                    }
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut ordered: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (index, value) in finished {
            ordered[index] = value;
        }

        let succeeded = ordered.iter().filter(|r| r.is_some()).count();
        tracing::debug!(
            batch = label,
            succeeded,
            failed = total - succeeded,
            "download batch finished"
        );
        ordered
    }
}
