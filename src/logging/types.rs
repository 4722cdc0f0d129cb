//! The [`Log`] trait.

/// Abstraction over logging backends.
///
/// The entry point takes a `&dyn Log` so tests can observe what would be
/// reported to the user without a global subscriber.
#[cfg_attr(test, mockall::automock)]
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (shown on the console only when verbose).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
}
