use ratchet_core::error::Result;

/// The final state of one target's unit.
#[derive(Debug)]
pub struct TargetOutcome {
    /// Target name.
    pub target: String,
    /// Runner attempts made; 0 when the unit failed before running.
    pub attempts: u32,
    /// Migrations applied by the successful attempt, or the last error.
    pub result: Result<usize>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-target outcomes of one executor run, in configuration order.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<TargetOutcome>,
}

impl ExecutionReport {
    /// True only if every target succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }

    pub fn failed_targets(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.target.as_str())
            .collect()
    }

    pub fn outcome(&self, target: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.target == target)
    }

    /// Migrations applied across all targets.
    pub fn total_applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_core::error::RatchetError;

    fn outcome(target: &str, result: Result<usize>) -> TargetOutcome {
        TargetOutcome {
            target: target.to_string(),
            attempts: 1,
            result,
        }
    }

    #[test]
    fn test_empty_report_succeeds() {
        assert!(ExecutionReport::default().all_succeeded());
    }

    #[test]
    fn test_report_aggregation() {
        let report = ExecutionReport {
            outcomes: vec![
                outcome("a", Ok(2)),
                outcome("b", Err(RatchetError::Cancelled)),
                outcome("c", Ok(3)),
            ],
        };

        assert!(!report.all_succeeded());
        assert_eq!(report.failed_targets(), vec!["b"]);
        assert_eq!(report.total_applied(), 5);
        assert!(report.outcome("c").unwrap().is_success());
        assert!(report.outcome("missing").is_none());
    }
}
