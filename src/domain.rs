//! Domain types for the inactivity monitor.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde::Serialize;

/// Name of a host input event that counts as user activity
/// (newtype for type safety).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKind(String);

impl EventKind {
    /// Create a new event kind.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the event name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The input events treated as activity when none are configured.
pub fn default_reset_events() -> Vec<EventKind> {
    [
        "pointerdown",
        "pointermove",
        "keypress",
        "scroll",
        "touchstart",
        "click",
        "keydown",
    ]
    .into_iter()
    .map(EventKind::from)
    .collect()
}

/// Observable monitor state, published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StateSnapshot {
    /// Monitoring has been started and not stopped.
    pub is_active: bool,

    /// The warning window is currently open.
    pub is_warning_visible: bool,

    /// Seconds left in the warning countdown (0 when the warning is hidden).
    pub time_remaining: u64,
}

/// Synchronous lifecycle hook (`on_warning`, `on_extend`).
pub type HookFn = Arc<dyn Fn() + Send + Sync>;

/// Logout hook; may be asynchronous and may fail.
pub type LogoutFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Lifecycle callbacks invoked by the monitor.
///
/// Kept separate from [`crate::config::MonitorConfig`] so the configuration
/// stays plain serde data while the hooks stay code.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Invoked when the warning window opens.
    pub on_warning: Option<HookFn>,

    /// Invoked when the user extends the session.
    pub on_extend: Option<HookFn>,

    /// Invoked after the monitor clears itself on logout.
    pub on_logout: Option<LogoutFn>,
}

impl Callbacks {
    /// Create callbacks with no hooks set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the warning hook.
    #[must_use]
    pub fn on_warning(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_warning = Some(Arc::new(f));
        self
    }

    /// Set the extend hook.
    #[must_use]
    pub fn on_extend(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_extend = Some(Arc::new(f));
        self
    }

    /// Set the logout hook.
    #[must_use]
    pub fn on_logout(
        mut self,
        f: impl Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    ) -> Self {
        self.on_logout = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_warning", &self.on_warning.is_some())
            .field("on_extend", &self.on_extend.is_some())
            .field("on_logout", &self.on_logout.is_some())
            .finish()
    }
}
