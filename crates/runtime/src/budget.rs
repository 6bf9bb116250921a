//! Per-session tool call budget.

use std::fmt;

/// Budget used when none is configured.
pub const DEFAULT_CALL_BUDGET: u32 = 20;

/// Counts tool invocations against a fixed limit.
///
/// Every dispatched call (including ones rejected locally for naming an
/// unknown tool) consumes exactly one unit. The counter never goes past the
/// limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBudget {
    limit: u32,
    used: u32,
}

impl CallBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    /// Take one unit. Returns false, leaving the budget untouched, when
    /// nothing is left.
    pub fn try_consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }
}

impl Default for CallBudget {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_BUDGET)
    }
}

impl fmt::Display for CallBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} tool calls used", self.used, self.limit)
    }
}
