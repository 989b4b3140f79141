//! Step accounting.
//!
//! The search has no cancellation primitive. Instead every unit of work (a
//! VM step, an allomorph rule tried at a position, a combination attempt)
//! calls [`Budget::tick`], a counter comparison. Exceeding the limit aborts
//! the call with [`AnalysisError::BudgetExceeded`], which the host can tell
//! apart from an empty result.

use crate::error::AnalysisError;

#[derive(Debug, Clone)]
pub(crate) struct Budget {
    limit: Option<u64>,
    used: u64,
}

impl Budget {
    /// `None` means unlimited.
    pub fn new(limit: Option<u64>) -> Self {
        Budget { limit, used: 0 }
    }

    #[inline]
    pub fn tick(&mut self) -> Result<(), AnalysisError> {
        self.used += 1;
        match self.limit {
            Some(limit) if self.used > limit => Err(AnalysisError::BudgetExceeded { steps: limit }),
            _ => Ok(()),
        }
    }

    pub fn used(&self) -> u64 {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_fails_once_the_limit_is_passed() {
        let mut budget = Budget::new(Some(2));
        assert!(budget.tick().is_ok());
        assert!(budget.tick().is_ok());
        assert_eq!(budget.tick(), Err(AnalysisError::BudgetExceeded { steps: 2 }));
        assert_eq!(budget.used(), 3);
    }

    #[test]
    fn unlimited_budget_never_fails() {
        let mut budget = Budget::new(None);
        for _ in 0..10_000 {
            assert!(budget.tick().is_ok());
        }
    }
}
