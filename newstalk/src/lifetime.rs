use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifetime token of one mounted view.
///
/// Timer tasks scheduled through it never run after [`ViewLifetime::teardown`],
/// and anything mutating view state checks [`ViewLifetime::is_mounted`] first.
#[derive(Debug, Clone, Default)]
pub struct ViewLifetime {
    token: CancellationToken,
}

impl ViewLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Nested lifetime, ended by its own teardown or by this one's.
    pub fn child(&self) -> ViewLifetime {
        ViewLifetime {
            token: self.token.child_token(),
        }
    }

    /// Run `task` after `delay` unless the view is torn down first.
    /// Resolves to `None` when the task was dropped.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                _ = tokio::time::sleep(delay) => {
                    if token.is_cancelled() {
                        None
                    } else {
                        Some(task.await)
                    }
                }
            }
        })
    }

    pub fn teardown(&self) {
        if self.is_mounted() {
            debug!("view lifetime ended, cancelling pending tasks");
        }
        self.token.cancel();
    }
}

/// Keys of fetches currently outstanding (e.g. "business/tesla_3").
#[derive(Debug, Clone, Default)]
pub struct FetchGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`; `None` while another fetch for the same key is running.
    pub fn try_begin(&self, key: impl Into<String>) -> Option<FetchTicket> {
        let key = key.into();
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key.clone()) {
            return None;
        }
        Some(FetchTicket {
            key,
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct FetchTicket {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl FetchTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn scheduled_task_runs_while_mounted() {
        let lifetime = ViewLifetime::new();
        let handle = lifetime.schedule(Duration::from_millis(5), async { 42 });
        assert_eq!(handle.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn teardown_drops_pending_tasks() {
        let lifetime = ViewLifetime::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handle = lifetime.schedule(Duration::from_millis(200), async move {
            h.fetch_add(1, Ordering::SeqCst);
        });
        lifetime.teardown();
        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!lifetime.is_mounted());
    }

    #[test]
    fn child_lifetime_ends_with_parent() {
        let root = ViewLifetime::new();
        let first = root.child();
        let second = root.child();
        first.teardown();
        assert!(root.is_mounted());
        assert!(second.is_mounted());
        root.teardown();
        assert!(!second.is_mounted());
    }

    #[test]
    fn fetch_guard_rejects_overlapping_keys() {
        let guard = FetchGuard::new();
        let ticket = guard.try_begin("business/ipo").expect("first claim");
        assert!(guard.try_begin("business/ipo").is_none());
        assert!(guard.try_begin("business/tesla").is_some());
        assert!(guard.is_loading("business/ipo"));
        drop(ticket);
        assert!(!guard.is_loading("business/ipo"));
        assert!(guard.try_begin("business/ipo").is_some());
    }
}
