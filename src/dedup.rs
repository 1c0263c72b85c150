//! Deduplication window for at-least-once event delivery
//!
//! Telegram may redeliver messages and callback queries. Every event id is
//! admitted once; repeats are rejected until the entry expires.
//!
//! The window is bounded. Once `max_capacity` ids are held, the cache evicts
//! entries before their horizon and an evicted id would be admitted again, so
//! the capacity must exceed the number of events expected within one horizon.
//! A warning is logged when the window fills past 90%.

use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, warn};

/// Recently processed event ids with a fixed expiry horizon
#[derive(Clone)]
pub struct DedupWindow {
    /// event_id -> () with automatic TTL
    cache: Cache<String, ()>,
    horizon: Duration,
    max_capacity: u64,
}

impl DedupWindow {
    /// Creates a new window
    ///
    /// # Arguments
    ///
    /// * `horizon` - How long an admitted id is remembered
    /// * `max_capacity` - Maximum number of remembered ids
    ///
    /// # Examples
    ///
    /// ```
    /// use mazza_bot::dedup::DedupWindow;
    /// use std::time::Duration;
    ///
    /// let window = DedupWindow::new(Duration::from_secs(600), 100_000);
    /// assert_eq!(window.horizon(), Duration::from_secs(600));
    /// ```
    #[must_use]
    pub fn new(horizon: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(horizon)
            .build();

        Self {
            cache,
            horizon,
            max_capacity,
        }
    }

    /// Admits an event id.
    ///
    /// Returns `true` the first time an id is seen and `false` for every
    /// repeat until the entry expires. Concurrent callers racing on the same
    /// id get exactly one `true`.
    pub async fn admit(&self, event_id: &str) -> bool {
        let entry = self.cache.entry_by_ref(event_id).or_insert(()).await;
        let fresh = entry.is_fresh();
        if !fresh {
            debug!(event_id, "Duplicate event rejected");
        } else if self.is_near_capacity() {
            warn!(
                entries = self.cache.entry_count(),
                max_capacity = self.max_capacity,
                "Dedup window is near capacity; ids may be evicted before expiry"
            );
        }
        fresh
    }

    /// Returns `true` once the window holds at least 90% of its capacity.
    ///
    /// The entry count is approximate and lags behind recent inserts.
    #[must_use]
    pub fn is_near_capacity(&self) -> bool {
        self.cache.entry_count().saturating_mul(10) >= self.max_capacity.saturating_mul(9)
    }

    /// Returns the configured expiry horizon
    #[must_use]
    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Returns the current number of remembered ids
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_admission_succeeds() {
        let window = DedupWindow::new(Duration::from_secs(60), 100);
        assert!(window.admit("msg:1:10").await);
    }

    #[tokio::test]
    async fn test_repeat_is_rejected() {
        let window = DedupWindow::new(Duration::from_secs(60), 100);
        assert!(window.admit("cbq:abc").await);
        assert!(!window.admit("cbq:abc").await);
        assert!(!window.admit("cbq:abc").await);
    }

    #[tokio::test]
    async fn test_different_ids_independent() {
        let window = DedupWindow::new(Duration::from_secs(60), 100);
        assert!(window.admit("msg:1:10").await);
        assert!(window.admit("msg:2:10").await);
    }

    #[tokio::test]
    async fn test_readmitted_after_expiry() {
        let window = DedupWindow::new(Duration::from_millis(50), 100);
        assert!(window.admit("msg:1:10").await);
        assert!(!window.admit("msg:1:10").await);

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(window.admit("msg:1:10").await);
    }

    #[tokio::test]
    async fn test_concurrent_admission_single_winner() {
        let window = Arc::new(DedupWindow::new(Duration::from_secs(60), 100));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let window = window.clone();
                tokio::spawn(async move { window.admit("cbq:race").await })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.expect("task panicked") {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_entry_count() {
        let window = DedupWindow::new(Duration::from_secs(60), 100);
        window.admit("a").await;
        window.admit("b").await;
        window.admit("a").await;

        window.cache.run_pending_tasks().await;

        assert_eq!(window.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_near_capacity_is_reported() {
        let window = DedupWindow::new(Duration::from_secs(60), 10);
        for id in 0..8 {
            window.admit(&format!("msg:1:{id}")).await;
        }
        window.cache.run_pending_tasks().await;
        assert!(!window.is_near_capacity());

        window.admit("msg:1:8").await;
        window.cache.run_pending_tasks().await;
        assert!(window.is_near_capacity());
    }
}
