//! Restartable one-shot timer used to debounce flushes.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Debounce timer: every `schedule` call cancels the pending timer and
/// starts a new one, so a burst of calls fires exactly once after the
/// last call's delay has elapsed.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Default)]
pub struct DebounceScheduler {
    pending: Option<JoinHandle<()>>,
}

impl DebounceScheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// (Re)start the timer; `fire` runs once `delay` elapses undisturbed.
    ///
    /// `fire` runs on the timer task. Long-running work should be spawned
    /// from it, since a later `schedule` or `cancel` aborts that task.
    pub fn schedule<F>(&mut self, delay: Duration, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        }));
    }

    /// Cancel the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether a timer is running and has not fired yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let make = {
            let fired = Arc::clone(&fired);
            move || -> Box<dyn FnOnce() + Send> {
                let fired = Arc::clone(&fired);
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                })
            }
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once() {
        let (fired, make) = counter();
        let mut scheduler = DebounceScheduler::new();
        let delay = Duration::from_millis(400);

        for _ in 0..5 {
            scheduler.schedule(delay, make());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_pending());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_period() {
        let (fired, make) = counter();
        let mut scheduler = DebounceScheduler::new();

        scheduler.schedule(Duration::from_millis(400), make());
        tokio::time::sleep(Duration::from_millis(399)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let (fired, make) = counter();
        let mut scheduler = DebounceScheduler::new();

        scheduler.schedule(Duration::from_millis(400), make());
        scheduler.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_pending());
    }
}
