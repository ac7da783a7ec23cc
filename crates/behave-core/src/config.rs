#![forbid(unsafe_code)]

//! Process-wide interactivity settings.
//!
//! Settings come from the environment once per process (see
//! [`InteractivityConfig::current`]) and can be overridden per collection by
//! constructing a config explicitly.
//!
//! | Variable                | Field            | Default |
//! |-------------------------|------------------|---------|
//! | `BEHAVE_DESIGN_MODE`    | `design_mode`    | off     |
//! | `BEHAVE_TRACE_TEARDOWN` | `trace_teardown` | off     |
//!
//! Truthy values are `1`, `true`, `yes` and `on`, case-insensitive.

use std::sync::OnceLock;

/// Interactivity settings consumed by collections and lifetime observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractivityConfig {
    /// Design-surface mode: hosts are recorded but members are never
    /// attached and no lifetime observers are installed.
    pub design_mode: bool,
    /// Emit a debug event when collections and observer links are dropped.
    pub trace_teardown: bool,
}

impl InteractivityConfig {
    /// Config with every switch off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            design_mode: false,
            trace_teardown: false,
        }
    }

    /// Set design-surface mode.
    #[must_use]
    pub const fn with_design_mode(mut self, enabled: bool) -> Self {
        self.design_mode = enabled;
        self
    }

    /// Set teardown tracing.
    #[must_use]
    pub const fn with_trace_teardown(mut self, enabled: bool) -> Self {
        self.trace_teardown = enabled;
        self
    }

    /// Read the config from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read the config through a custom environment lookup.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            design_mode: get_env("BEHAVE_DESIGN_MODE").is_some_and(|v| env_flag(&v)),
            trace_teardown: get_env("BEHAVE_TRACE_TEARDOWN").is_some_and(|v| env_flag(&v)),
        }
    }

    /// Cached process-wide config (first call reads the environment).
    #[must_use]
    pub fn current() -> Self {
        static CURRENT: OnceLock<InteractivityConfig> = OnceLock::new();
        *CURRENT.get_or_init(Self::from_env)
    }
}

#[inline]
fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
