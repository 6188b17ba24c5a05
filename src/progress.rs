//! Progress reporting for long-running generation calls.
//!
//! The backends invoke the caller's callback at fixed checkpoints while
//! submitting, polling, and downloading. Fractions are clamped to `[0, 1]`
//! and are monotonically non-decreasing by convention, not enforcement.

/// Callback signature invoked with `(fraction_done, status_text)`.
pub type ProgressFn = dyn Fn(f32, &str) + Send + Sync;

/// A progress sink wrapping an optional caller-supplied callback.
///
/// Cheap to construct and pass by reference; when no callback is attached,
/// `report` only emits a debug log line.
pub struct Progress<'a> {
    callback: Option<&'a ProgressFn>,
}

impl<'a> Progress<'a> {
    /// Wrap a caller-supplied callback.
    pub fn new(callback: &'a ProgressFn) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// A sink that discards progress events.
    pub fn none() -> Self {
        Self { callback: None }
    }

    /// Report a progress checkpoint.
    ///
    /// `fraction` is clamped to `[0, 1]` before the callback sees it.
    pub fn report(&self, fraction: f32, message: &str) {
        let fraction = fraction.clamp(0.0, 1.0);
        log::debug!("progress {:.0}%: {}", fraction * 100.0, message);
        if let Some(callback) = self.callback {
            callback(fraction, message);
        }
    }
}
