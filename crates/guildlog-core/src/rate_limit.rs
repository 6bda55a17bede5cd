//! Sliding-window throttle keyed by (category, subject).

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{domain::SubjectId, event::Category};

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

type Key = (Category, SubjectId);

/// Admits at most `capacity` events per key in any trailing `window`.
///
/// Unlike a fixed bucket this decays continuously: each admitted event frees its
/// slot exactly `window` after it was recorded. Suppressed calls are not recorded.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    windows: DashMap<Key, VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            windows: DashMap::new(),
        }
    }

    pub fn allow(&self, category: Category, subject: SubjectId) -> bool {
        self.allow_at(category, subject, Instant::now())
    }

    pub fn allow_at(&self, category: Category, subject: SubjectId, now: Instant) -> bool {
        // The entry guard holds the shard lock, so prune + check + record is atomic per key.
        let mut window = self.windows.entry((category, subject)).or_default();
        prune(&mut window, now, self.window);

        if window.len() >= self.capacity {
            debug!(category = %category, subject = %subject, "Rate limited");
            return false;
        }
        window.push_back(now);
        true
    }

    /// Drop keys whose window is empty after pruning. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            prune(window, now, self.window);
            !window.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Periodically [`sweep`](Self::sweep) until `cancel` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            debug!(
                                removed,
                                remaining = self.tracked_keys(),
                                "Swept idle rate-limit keys"
                            );
                        }
                    }
                }
            }
        })
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) >= span {
            window.pop_front();
        } else {
            break;
        }
    }
}
