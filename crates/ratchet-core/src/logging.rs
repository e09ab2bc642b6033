//! Per-unit status logger.
//!
//! Each execution unit owns its own logger and hands it down to the runner,
//! so concurrent units never share a mutable label.

use std::fmt::Display;
use std::sync::Arc;

/// Structured logger bound to one target and, optionally, one attempt.
#[derive(Debug, Clone)]
pub struct UnitLogger {
    unit: Arc<str>,
    attempt: Option<u32>,
}

impl UnitLogger {
    /// Create a logger for a target.
    pub fn new(unit: impl Into<Arc<str>>) -> Self {
        Self {
            unit: unit.into(),
            attempt: None,
        }
    }

    /// Derive a logger labelled with an attempt number.
    pub fn for_attempt(&self, attempt: u32) -> Self {
        Self {
            unit: self.unit.clone(),
            attempt: Some(attempt),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn attempt(&self) -> Option<u32> {
        self.attempt
    }

    /// Human-readable label, e.g. `accounts (attempt 2)`.
    pub fn label(&self) -> String {
        match self.attempt {
            Some(n) => format!("{} (attempt {})", self.unit, n),
            None => self.unit.to_string(),
        }
    }

    pub fn debug(&self, message: impl Display) {
        tracing::debug!(unit = %self.unit, attempt = ?self.attempt, "{}", message);
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!(unit = %self.unit, attempt = ?self.attempt, "{}", message);
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(unit = %self.unit, attempt = ?self.attempt, "{}", message);
    }

    pub fn error(&self, error: impl Display) {
        tracing::error!(unit = %self.unit, attempt = ?self.attempt, error = %error, "{}", self.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_without_attempt() {
        let logger = UnitLogger::new("accounts");
        assert_eq!(logger.label(), "accounts");
        assert_eq!(logger.attempt(), None);
    }

    #[test]
    fn test_attempt_logger_is_independent() {
        let base = UnitLogger::new("accounts");
        let first = base.for_attempt(1);
        let second = base.for_attempt(2);

        assert_eq!(first.label(), "accounts (attempt 1)");
        assert_eq!(second.label(), "accounts (attempt 2)");
        assert_eq!(base.label(), "accounts");
        assert_eq!(second.unit(), "accounts");
    }
}
