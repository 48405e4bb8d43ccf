//! idle-sentry - framework-agnostic inactivity monitor.
//!
//! Detects prolonged user inactivity in a hosted session, opens a warning
//! countdown before automatic logout, and lets the user extend the session.
//! The core is a single state machine, [`InactivityMonitor`]; scheduling
//! ([`Scheduler`]) and input delivery ([`InputSurface`]) are capabilities
//! the host injects, so UI bindings stay thin and the monitor runs headless
//! under test.

pub mod config;
pub mod domain;
pub mod format;
pub mod input;
pub mod monitor;
pub mod scheduler;

pub use config::{ConfigError, ConfigUpdate, MonitorConfig};
pub use domain::{Callbacks, EventKind, HookFn, LogoutFn, StateSnapshot, default_reset_events};
pub use format::format_time_remaining;
pub use input::{ActivityHandler, EventRegistry, InputSurface, ListenerId};
pub use monitor::InactivityMonitor;
pub use scheduler::{Scheduler, TimerFn, TimerHandle, TokioScheduler};
