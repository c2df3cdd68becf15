//! Process-wide configuration for validation-error propagation.

use std::sync::RwLock;

use once_cell::sync::Lazy;

/// How validation failures are propagated from [`Schema::process`].
///
/// This is a single process-wide switch, not a per-call option. In `Raise`
/// mode a failed validation comes back as `Err(ProcessError::Invalid)`; in
/// `Result` mode it comes back as `Ok(Outcome { valid: false, .. })`.
/// Definition-time defects are errors in either mode.
///
/// [`Schema::process`]: crate::Schema::process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    #[default]
    Raise,
    Result,
}

static ERROR_MODE: Lazy<RwLock<ErrorMode>> = Lazy::new(|| RwLock::new(ErrorMode::default()));

/// Set the process-wide error-handling mode.
pub fn set_error_mode(mode: ErrorMode) {
    *ERROR_MODE.write().expect("error mode lock poisoned") = mode;
}

/// Current process-wide error-handling mode.
pub fn error_mode() -> ErrorMode {
    *ERROR_MODE.read().expect("error mode lock poisoned")
}
