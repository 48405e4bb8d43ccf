//! Inactivity monitor state machine.
//!
//! Tracks user activity against a configurable inactivity budget, opens a
//! warning countdown for the trailing portion of the budget, and triggers
//! logout when the budget is exhausted. Scheduling and input delivery are
//! host capabilities ([`Scheduler`], [`InputSurface`]); the monitor itself
//! holds no clock and assumes no DOM.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, trace};

use crate::config::{ConfigError, ConfigUpdate, MonitorConfig};
use crate::domain::{Callbacks, StateSnapshot};
use crate::format::format_time_remaining;
use crate::input::{InputSurface, ListenerId};
use crate::scheduler::{Scheduler, TimerHandle};

/// The three timer slots the monitor may hold, at most one of each.
///
/// Every transition boundary cancels through [`TimerSet::cancel_all`]
/// instead of clearing slots piecemeal.
#[derive(Debug, Default)]
struct TimerSet {
    /// Fires logout at `timeout_seconds` of silence.
    inactivity: Option<TimerHandle>,

    /// Fires the warning at `timeout_seconds - warning_seconds` of silence.
    warning: Option<TimerHandle>,

    /// One-second tick while the warning is open.
    countdown: Option<TimerHandle>,
}

impl TimerSet {
    fn cancel_all(&mut self, scheduler: &dyn Scheduler) {
        for handle in [
            self.inactivity.take(),
            self.warning.take(),
            self.countdown.take(),
        ]
        .into_iter()
        .flatten()
        {
            scheduler.cancel(handle);
        }
    }
}

/// Mutable monitor state, owned exclusively behind one mutex.
struct MonitorState {
    config: MonitorConfig,
    is_active: bool,
    is_warning_visible: bool,
    time_remaining: u64,

    /// Bumped on every re-arm, stop, pause and logout. Timer callbacks carry
    /// the epoch they were armed in and ignore the fire if it has moved on,
    /// so a timer that was already mid-fire at cancel time stays harmless.
    epoch: u64,

    timers: TimerSet,
    listeners: Vec<ListenerId>,
}

impl MonitorState {
    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            is_active: self.is_active,
            is_warning_visible: self.is_warning_visible,
            time_remaining: self.time_remaining,
        }
    }

    fn hide_warning(&mut self) {
        self.is_warning_visible = false;
        self.time_remaining = 0;
    }
}

struct Inner {
    scheduler: Arc<dyn Scheduler>,
    surface: Arc<dyn InputSurface>,
    callbacks: Callbacks,
    state: Mutex<MonitorState>,
    state_tx: watch::Sender<StateSnapshot>,
}

/// Framework-independent inactivity monitor.
///
/// Constructed with a validated [`MonitorConfig`] plus host capabilities,
/// driven by its operations and by the activity listeners it registers, and
/// observed through [`InactivityMonitor::subscribe`]. Dropping the monitor
/// stops it: no timers or listeners outlive the instance.
pub struct InactivityMonitor {
    inner: Arc<Inner>,
}

impl InactivityMonitor {
    /// Create a monitor. Fails if the configuration violates the timing
    /// invariants; no timers are armed until [`InactivityMonitor::start`].
    pub fn new(
        config: MonitorConfig,
        callbacks: Callbacks,
        scheduler: Arc<dyn Scheduler>,
        surface: Arc<dyn InputSurface>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = MonitorState {
            config,
            is_active: false,
            is_warning_visible: false,
            time_remaining: 0,
            epoch: 0,
            timers: TimerSet::default(),
            listeners: Vec::new(),
        };
        let (state_tx, _) = watch::channel(state.snapshot());

        Ok(Self {
            inner: Arc::new(Inner {
                scheduler,
                surface,
                callbacks,
                state: Mutex::new(state),
                state_tx,
            }),
        })
    }

    /// Start monitoring: register activity listeners and arm a fresh
    /// full-budget window. Idempotent when already active, except that the
    /// window restarts.
    pub fn start(&self) {
        Inner::start(&self.inner);
    }

    /// Stop monitoring: cancel all timers, hide the warning and remove the
    /// listeners this monitor registered. Safe to call when already idle.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Cancel all timers without deactivating the monitor or touching its
    /// listeners. No-op when nothing is armed.
    pub fn pause(&self) {
        self.inner.pause();
    }

    /// Re-arm a fresh full-budget window if active; no-op otherwise.
    pub fn resume(&self) {
        let is_active = self.inner.lock_state().is_active;
        if is_active {
            debug!("Resuming monitoring");
            Inner::reset_activity(&self.inner);
        }
    }

    /// Record user activity: cancel timers, hide the warning and, if active
    /// and enabled, arm a fresh window. The single re-arming entry point.
    pub fn reset_activity(&self) {
        Inner::reset_activity(&self.inner);
    }

    /// Extend the session from the warning window: hide the warning, fire
    /// `on_extend` and re-arm a fresh window. Outside the warning window it
    /// still fires the hook and re-arms.
    pub fn extend_session(&self) {
        Inner::extend_session(&self.inner);
    }

    /// Merge a partial configuration update.
    ///
    /// The merged result is validated before anything is touched; on
    /// rejection the prior configuration stays in force and no timer is
    /// affected. When active, monitoring restarts so the new timing takes
    /// effect immediately; otherwise it applies on the next `start`.
    pub fn reconfigure(&self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        let was_active = {
            let mut state = self.inner.lock_state();
            let merged = state.config.merged(update);
            merged.validate()?;
            debug!(
                "Reconfigured: timeout={}s warning={}s enabled={}",
                merged.timeout_seconds, merged.warning_seconds, merged.enabled
            );
            state.config = merged;
            state.is_active
        };

        if was_active {
            self.stop();
            self.start();
        }
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> MonitorConfig {
        self.inner.lock_state().config.clone()
    }

    /// Current observable state.
    pub fn snapshot(&self) -> StateSnapshot {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.inner.state_tx.subscribe()
    }

    /// Whether monitoring has been started and not stopped.
    pub fn is_active(&self) -> bool {
        self.snapshot().is_active
    }

    /// Whether the warning window is currently open.
    pub fn is_warning_visible(&self) -> bool {
        self.snapshot().is_warning_visible
    }

    /// Seconds left in the warning countdown (0 when the warning is hidden).
    pub fn time_remaining(&self) -> u64 {
        self.snapshot().time_remaining
    }

    /// The current countdown formatted as `M:SS`.
    pub fn format_time_remaining(&self) -> String {
        format_time_remaining(self.time_remaining())
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().expect("monitor state poisoned")
    }

    fn publish(&self, state: &MonitorState) {
        self.state_tx.send_replace(state.snapshot());
    }

    fn start(self: &Arc<Self>) {
        let events = {
            let mut state = self.lock_state();
            state.is_active = true;
            self.publish(&state);
            if state.listeners.is_empty() {
                Some(state.config.reset_activity_events.clone())
            } else {
                None
            }
        };

        if let Some(events) = events {
            let weak = Arc::downgrade(self);
            let handler: crate::input::ActivityHandler = Arc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    trace!("Activity: {}", event);
                    Inner::reset_activity(&inner);
                }
            });

            let ids: Vec<ListenerId> = events
                .iter()
                .map(|event| self.surface.add_listener(event, Arc::clone(&handler)))
                .collect();

            // A stop() may have interleaved while the lock was released for
            // registration; listeners must not survive a stopped monitor.
            let mut state = self.lock_state();
            if state.is_active {
                debug!("Monitoring started with {} activity listener(s)", ids.len());
                state.listeners.extend(ids);
            } else {
                drop(state);
                for id in ids {
                    self.surface.remove_listener(id);
                }
                return;
            }
        }

        Self::reset_activity(self);
    }

    fn stop(self: &Arc<Self>) {
        let ids = {
            let mut state = self.lock_state();
            state.is_active = false;
            state.epoch += 1;
            state.timers.cancel_all(&*self.scheduler);
            state.hide_warning();
            self.publish(&state);
            std::mem::take(&mut state.listeners)
        };

        if !ids.is_empty() {
            debug!("Monitoring stopped, removing {} listener(s)", ids.len());
        }
        for id in ids {
            self.surface.remove_listener(id);
        }
    }

    fn pause(self: &Arc<Self>) {
        let mut state = self.lock_state();
        state.epoch += 1;
        state.timers.cancel_all(&*self.scheduler);
        debug!("Monitoring paused");
    }

    fn reset_activity(self: &Arc<Self>) {
        let mut state = self.lock_state();
        state.epoch += 1;
        state.timers.cancel_all(&*self.scheduler);

        if state.is_warning_visible {
            state.hide_warning();
        }
        self.publish(&state);

        if !state.is_active || !state.config.enabled {
            return;
        }

        let epoch = state.epoch;
        let warning_delay = Duration::from_secs(state.config.warning_delay_seconds());
        let timeout = Duration::from_secs(state.config.timeout_seconds);

        // Both timers armed atomically from the same instant; the warning
        // delay is strictly shorter, so within one epoch the warning always
        // fires first.
        let weak = Arc::downgrade(self);
        state.timers.warning = Some(self.scheduler.after(
            warning_delay,
            fire(&weak, epoch, Inner::show_warning),
        ));
        let weak = Arc::downgrade(self);
        state.timers.inactivity = Some(
            self.scheduler
                .after(timeout, fire(&weak, epoch, Inner::trigger_logout)),
        );

        trace!(
            "Armed window: warning in {:?}, logout in {:?}",
            warning_delay, timeout
        );
    }

    /// Fired by the warning timer.
    fn show_warning(self: &Arc<Self>, epoch: u64) {
        {
            let mut state = self.lock_state();
            if epoch != state.epoch || !state.is_active {
                return;
            }
            state.timers.warning = None;
            state.is_warning_visible = true;
            state.time_remaining = state.config.warning_seconds;
            self.publish(&state);
            debug!("Warning opened, {}s remaining", state.time_remaining);
        }

        if let Some(ref on_warning) = self.callbacks.on_warning {
            on_warning();
        }

        // The hook may have extended or stopped; only arm the countdown if
        // this epoch is still current.
        let weak = Arc::downgrade(self);
        let mut state = self.lock_state();
        if epoch == state.epoch && state.is_warning_visible {
            state.timers.countdown = Some(
                self.scheduler
                    .every(Duration::from_secs(1), fire(&weak, epoch, Inner::tick)),
            );
        }
    }

    /// One countdown tick. Decrement and boundary check are a single
    /// critical section: no tick leaves `time_remaining` negative or skips
    /// the logout trigger.
    fn tick(self: &Arc<Self>, epoch: u64) {
        let exhausted = {
            let mut state = self.lock_state();
            if epoch != state.epoch {
                return;
            }
            if state.time_remaining <= 1 {
                if let Some(handle) = state.timers.countdown.take() {
                    self.scheduler.cancel(handle);
                }
                true
            } else {
                state.time_remaining -= 1;
                self.publish(&state);
                trace!("Countdown: {}s remaining", state.time_remaining);
                false
            }
        };

        if exhausted {
            Self::trigger_logout(self, epoch);
        }
    }

    fn extend_session(self: &Arc<Self>) {
        {
            let mut state = self.lock_state();
            state.epoch += 1;
            if let Some(handle) = state.timers.countdown.take() {
                self.scheduler.cancel(handle);
            }
            if state.is_warning_visible {
                state.hide_warning();
                self.publish(&state);
            }
            debug!("Session extended");
        }

        if let Some(ref on_extend) = self.callbacks.on_extend {
            on_extend();
        }

        Self::reset_activity(self);
    }

    /// Fired by the inactivity timer or by countdown exhaustion; the epoch
    /// guard makes the first path to fire win.
    fn trigger_logout(self: &Arc<Self>, epoch: u64) {
        {
            let mut state = self.lock_state();
            if epoch != state.epoch {
                return;
            }
            state.epoch += 1;
            state.timers.cancel_all(&*self.scheduler);
            state.hide_warning();
            self.publish(&state);
        }

        info!("Session logged out after inactivity");

        // State is already cleared; the hook is awaited only to report
        // failure, which never propagates to the monitor's caller.
        if let Some(ref on_logout) = self.callbacks.on_logout {
            let fut = on_logout();
            tokio::spawn(async move {
                if let Err(e) = fut.await {
                    error!("Logout callback failed: {e:#}");
                }
            });
        }
    }
}

/// Build a timer callback that re-enters the monitor at a fixed epoch.
fn fire(
    weak: &Weak<Inner>,
    epoch: u64,
    op: fn(&Arc<Inner>, u64),
) -> crate::scheduler::TimerFn {
    let weak = weak.clone();
    Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            op(&inner, epoch);
        }
    })
}
