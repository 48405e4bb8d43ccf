//! Host scheduling capability.
//!
//! The monitor never owns a clock of its own; it asks a [`Scheduler`] for
//! single-shot delays and repeating intervals and cancels them through the
//! returned handles. The production implementation is [`TokioScheduler`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::AbortHandle;

/// Callback fired by a scheduled timer.
pub type TimerFn = Box<dyn FnMut() + Send + 'static>;

/// Handle to an armed timer. Cancelling a handle whose timer already fired
/// (or was already cancelled) is a no-op.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

/// Trait for host-provided timer scheduling.
pub trait Scheduler: Send + Sync {
    /// Arm a single-shot timer that fires `f` once after `delay`.
    fn after(&self, delay: Duration, f: TimerFn) -> TimerHandle;

    /// Arm a repeating timer that fires `f` every `period`, starting one
    /// period from now.
    fn every(&self, period: Duration, f: TimerFn) -> TimerHandle;

    /// Cancel an armed timer. Unconditional and idempotent.
    fn cancel(&self, handle: TimerHandle);
}

/// Scheduler backed by spawned tokio tasks.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    /// Number of timers currently armed (fired and cancelled ones excluded).
    live: Arc<AtomicUsize>,
}

impl TokioScheduler {
    /// Create a new scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers currently armed.
    ///
    /// Drops to zero once every handle has fired to completion or been
    /// cancelled; used to verify teardown leaves nothing pending.
    pub fn active_timers(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    fn track(&self) -> LiveGuard {
        self.live.fetch_add(1, Ordering::Relaxed);
        LiveGuard {
            live: Arc::clone(&self.live),
        }
    }
}

/// Decrements the live-timer count when the owning task completes or is
/// aborted (dropping the future runs the guard's Drop either way).
struct LiveGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Scheduler for TokioScheduler {
    fn after(&self, delay: Duration, mut f: TimerFn) -> TimerHandle {
        let guard = self.track();
        // Deadline is fixed at arm time; the spawned task may be polled
        // arbitrarily later without shifting it.
        let deadline = tokio::time::Instant::now() + delay;
        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep_until(deadline).await;
            f();
        });
        TimerHandle {
            abort: handle.abort_handle(),
        }
    }

    fn every(&self, period: Duration, mut f: TimerFn) -> TimerHandle {
        let guard = self.track();
        let mut deadline = tokio::time::Instant::now() + period;
        let handle = tokio::spawn(async move {
            let _guard = guard;
            loop {
                tokio::time::sleep_until(deadline).await;
                f();
                deadline += period;
            }
        });
        TimerHandle {
            abort: handle.abort_handle(),
        }
    }

    fn cancel(&self, handle: TimerHandle) {
        handle.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Let spawned timer tasks run after the paused clock advanced.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn counting_fn(counter: &Arc<AtomicUsize>) -> TimerFn {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_fires_once() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let _handle = scheduler.after(Duration::from_secs(3), counting_fn(&fired));

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.after(Duration::from_secs(3), counting_fn(&fired));

        scheduler.cancel(handle);
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_repeatedly() {
        let scheduler = TokioScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.every(Duration::from_secs(1), counting_fn(&ticks));

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        scheduler.cancel(handle);
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_measured_from_arming() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        // No yield between arming and advancing: the task is first polled
        // after the clock has already moved, and the deadline must not
        // shift with it.
        let _handle = scheduler.after(Duration::from_secs(3), counting_fn(&fired));
        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_measured_from_arming() {
        let scheduler = TokioScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.every(Duration::from_secs(1), counting_fn(&ticks));

        // Two periods elapse before the first poll; both ticks are due.
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        scheduler.cancel(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_timers_counts_armed() {
        let scheduler = TokioScheduler::new();
        let noop = Arc::new(AtomicUsize::new(0));

        let a = scheduler.after(Duration::from_secs(5), counting_fn(&noop));
        let b = scheduler.every(Duration::from_secs(1), counting_fn(&noop));
        settle().await;
        assert_eq!(scheduler.active_timers(), 2);

        scheduler.cancel(a);
        scheduler.cancel(b);
        settle().await;
        assert_eq!(scheduler.active_timers(), 0);
    }
}
