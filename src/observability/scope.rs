//! Scope-based lifecycle logging and slow-operation timing
//!
//! - `ObservationScope` logs `{name}_BEGIN`, then `{name}_COMPLETE` or `{name}_FAILED`
//! - Dropping an unfinished scope logs `{name}_INCOMPLETE`
//! - `Timer::warn_if_slow` logs a warning past a threshold, never cancels

use std::cell::Cell;
use std::time::{Duration, Instant};

use super::logger::Logger;

/// Event logged when an operation exceeds its slow threshold
pub const SLOW_OPERATION_EVENT: &str = "SCHEMA_SLOW_OPERATION";

/// A scope that logs begin and end events
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::trace(&format!("{}_BEGIN", name), fields);
        Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    /// Logs `{name}_COMPLETE` with the scope fields plus `extra_fields`
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.extend(extra_fields.iter().copied());
        Logger::info(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Logs `{name}_FAILED` at ERROR level
    pub fn fail(self, reason: &str) {
        self.completed.set(true);
        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &all_fields);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// Wall-clock timer for operation latency
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed milliseconds as a string, for log fields
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }

    /// Log `SCHEMA_SLOW_OPERATION` if the elapsed time reached `threshold`.
    ///
    /// Returns whether the warning was emitted.
    pub fn warn_if_slow(&self, operation: &str, threshold: Duration, fields: &[(&str, &str)]) -> bool {
        let elapsed = self.elapsed();
        if elapsed < threshold {
            return false;
        }
        let elapsed_ms = elapsed.as_millis().to_string();
        let mut all_fields: Vec<(&str, &str)> = vec![("operation", operation), ("elapsed_ms", &elapsed_ms)];
        all_fields.extend(fields.iter().copied());
        Logger::warn(SLOW_OPERATION_EVENT, &all_fields);
        true
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_complete() {
        let scope = ObservationScope::new("TEST");
        assert!(!scope.is_completed());
        scope.complete();
    }

    #[test]
    fn test_scope_with_fields_and_failure() {
        let scope = ObservationScope::with_fields("TEST", &[("table", "variants")]);
        scope.fail("lock timeout");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("TEST");
        drop(scope);
    }

    #[test]
    fn test_fast_operation_not_reported() {
        let timer = Timer::new();
        assert!(!timer.warn_if_slow("ALTER", Duration::from_secs(10), &[]));
    }

    #[test]
    fn test_zero_threshold_always_reported() {
        let timer = Timer::new();
        assert!(timer.warn_if_slow("ALTER", Duration::ZERO, &[("table", "t")]));
    }
}
