#![forbid(unsafe_code)]

//! Logging facade.
//!
//! With the `tracing` feature the standard `tracing` macros are re-exported
//! here and at the crate root. Without it, same-named macros expand to
//! nothing so call sites compile unchanged and cost nothing.
//!
//! `tracing-json` adds [`init_json_subscriber`], a one-call JSON subscriber
//! filtered by `RUST_LOG`.

#[cfg(feature = "tracing")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! trace {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! info {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
#[doc(hidden)]
macro_rules! error {
    ($($arg:tt)*) => {{}};
}

/// Install a global JSON subscriber honouring `RUST_LOG`.
///
/// Returns an error if a global subscriber is already set.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
}
