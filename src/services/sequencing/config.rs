//! Optimizer configuration

use chrono::Duration;

use crate::defaults::{default_improvement_threshold, DEFAULT_MAX_SWEEPS};

/// Configuration for the tour optimizer
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Matrix position the tour starts from (the depot)
    pub start_index: usize,
    /// Rotate the final tour so the depot comes first
    pub freeze_first: bool,
    /// Maximum number of 2-opt sweeps
    pub max_sweeps: usize,
    /// A 2-opt move is applied only when it saves more than this
    pub improvement_threshold: Duration,
    /// Count the closing edge (last stop back to depot) in the reported
    /// totals and in the local search cost model
    pub include_return_edge: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            freeze_first: false,
            max_sweeps: DEFAULT_MAX_SWEEPS,
            improvement_threshold: default_improvement_threshold(),
            include_return_edge: false,
        }
    }
}

impl OptimizerConfig {
    pub fn with_freeze_first(mut self, freeze_first: bool) -> Self {
        self.freeze_first = freeze_first;
        self
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn with_return_edge(mut self, include_return_edge: bool) -> Self {
        self.include_return_edge = include_return_edge;
        self
    }

    pub fn with_start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }
}
