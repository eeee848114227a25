//! Quota counters.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::resources::ResourceError;
use crate::runtime::stream::ApiStream;

/// A counter processors can check and consume.
pub trait Quota: Send + Sync + Debug {
    fn id(&self) -> &str;

    /// True when one more request fits in the current window.
    fn allowed(&self, stream: &ApiStream) -> bool;

    /// Consume one unit.
    fn inc(&self, stream: &ApiStream);

    /// Give one unit back.
    fn dec(&self, stream: &ApiStream);

    /// Check and consume under one lock; returns whether the request was admitted.
    fn try_acquire(&self, stream: &ApiStream) -> bool;
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u64,
}

/// Fixed-window counter, optionally partitioned by a request header.
///
/// Expired group windows are evicted whenever a new group is first seen.
#[derive(Debug)]
pub struct FixedWindowQuota {
    id: String,
    limit: u64,
    window: Duration,
    group_by_header: Option<String>,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowQuota {
    pub fn new(
        id: impl Into<String>,
        limit: u64,
        window: Duration,
        group_by_header: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ResourceError> {
        let id = id.into();
        if window.is_zero() {
            return Err(ResourceError::InvalidQuota {
                id,
                reason: "window must be greater than zero".into(),
            });
        }
        Ok(Self {
            id,
            limit,
            window,
            group_by_header: group_by_header.map(|h| h.to_lowercase()),
            clock,
            windows: Mutex::new(HashMap::new()),
        })
    }

    fn group_key(&self, stream: &ApiStream) -> String {
        self.group_by_header
            .as_deref()
            .and_then(|header| stream.header(header))
            .unwrap_or_default()
            .to_string()
    }

    fn with_window<T>(&self, stream: &ApiStream, f: impl FnOnce(&mut Window, u64) -> T) -> T {
        let now = self.clock.now();
        let key = self.group_key(stream);
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !windows.contains_key(&key) {
            windows.retain(|_, window| now.duration_since(window.started) < self.window);
        }
        let window = windows.entry(key).or_insert(Window { started: now, count: 0 });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        f(window, self.limit)
    }

    #[cfg(test)]
    fn tracked_groups(&self) -> usize {
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

impl Quota for FixedWindowQuota {
    fn id(&self) -> &str {
        &self.id
    }

    fn allowed(&self, stream: &ApiStream) -> bool {
        self.with_window(stream, |window, limit| window.count < limit)
    }

    fn inc(&self, stream: &ApiStream) {
        self.with_window(stream, |window, _| window.count += 1)
    }

    fn dec(&self, stream: &ApiStream) {
        self.with_window(stream, |window, _| window.count = window.count.saturating_sub(1))
    }

    fn try_acquire(&self, stream: &ApiStream) -> bool {
        self.with_window(stream, |window, limit| {
            if window.count < limit {
                window.count += 1;
                true
            } else {
                false
            }
        })
    }
}
