//! Time source injected into processors that wait.
//!
//! `SystemClock` defers to tokio; `MockClock` only moves when a test calls
//! `advance`, firing every timer whose deadline has passed.

use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::oneshot;

#[async_trait]
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;

    /// Resolve once `duration` has elapsed on this clock. Dropping the future cancels the wait.
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct MockState {
    elapsed: Duration,
    timers: Vec<(Duration, oneshot::Sender<()>)>,
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct MockClock {
    origin: Instant,
    state: Mutex<MockState>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(MockState {
                elapsed: Duration::ZERO,
                timers: Vec::new(),
            }),
        }
    }

    /// Move time forward and fire every timer that is now due.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.elapsed += by;
        let now = state.elapsed;

        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.timers)
            .into_iter()
            .partition(|(deadline, _)| *deadline <= now);
        state.timers = pending;
        drop(state);

        for (_, tx) in due {
            let _ = tx.send(());
        }
    }

    /// Number of sleeps currently waiting on this clock.
    pub fn pending_timers(&self) -> usize {
        self.lock().timers.iter().filter(|(_, tx)| !tx.is_closed()).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // Timer list stays valid across a poisoned lock.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let rx = {
            let mut state = self.lock();
            let deadline = state.elapsed + duration;
            let (tx, rx) = oneshot::channel();
            state.timers.push((deadline, tx));
            rx
        };
        let _ = rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mock_clock_fires_on_advance() {
        let clock = Arc::new(MockClock::new());
        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep(Duration::from_secs(5)).await })
        };

        while clock.pending_timers() == 0 {
            tokio::task::yield_now().await;
        }

        clock.advance(Duration::from_secs(4));
        assert_eq!(clock.pending_timers(), 1);

        clock.advance(Duration::from_secs(1));
        sleeper.await.unwrap();
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_mock_clock_now_moves_only_on_advance() {
        let clock = MockClock::new();
        let before = clock.now();
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now() - before, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_zero_sleep_returns_immediately() {
        let clock = MockClock::new();
        clock.sleep(Duration::ZERO).await;
        assert_eq!(clock.pending_timers(), 0);
    }
}
