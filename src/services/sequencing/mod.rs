//! Stop sequencing kernel
//!
//! Nearest-neighbor construction, 2-opt improvement, optional freeze-first
//! rotation and metrics aggregation. Pure and synchronous: the matrix comes
//! in, a tour and its totals come out.

mod config;
mod error;
mod freeze;
mod metrics;
mod nearest_neighbor;
mod problem;
mod two_opt;

pub use config::OptimizerConfig;
pub use error::SequencingError;
pub use freeze::freeze_first;
pub use metrics::{route_totals, Metrics, RouteTotals};
pub use nearest_neighbor::nearest_neighbor;
pub use problem::{SequencedRoute, SequencingProblem, Waypoint, WaypointIndex, WaypointKey};
pub use two_opt::{two_opt, two_opt_with_stats, TwoOptOutcome};

use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use crate::services::routing::CostMatrix;

/// Final tour and its totals
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    /// Matrix positions in visiting order
    pub tour: Vec<usize>,
    /// Reported distance in meters (see `OptimizerConfig::include_return_edge`)
    pub total_distance: f64,
    /// Reported duration in seconds
    pub total_duration: f64,
    pub totals: RouteTotals,
    pub sweeps: usize,
    pub moves: usize,
}

impl OptimizationResult {
    fn degenerate(tour: Vec<usize>) -> Self {
        Self {
            tour,
            total_distance: 0.0,
            total_duration: 0.0,
            totals: RouteTotals::default(),
            sweeps: 0,
            moves: 0,
        }
    }
}

/// Sequence every waypoint of `matrix` into a tour starting at
/// `config.start_index`.
pub fn optimize_route(
    matrix: &CostMatrix,
    config: &OptimizerConfig,
) -> Result<OptimizationResult, SequencingError> {
    let n = matrix.size();
    let start = config.start_index;

    if n > 0 && start >= n {
        return Err(SequencingError::StartOutOfRange { start, size: n });
    }
    if n == 0 {
        return Ok(OptimizationResult::degenerate(vec![]));
    }
    if n == 1 {
        return Ok(OptimizationResult::degenerate(vec![start]));
    }

    let started_at = Instant::now();
    let initial = nearest_neighbor(matrix, start)?;

    let threshold = matrix.unit().from_duration(config.improvement_threshold);
    let outcome = two_opt_with_stats(
        &initial,
        matrix,
        config.max_sweeps,
        threshold,
        config.include_return_edge,
    );

    let tour = if config.freeze_first && outcome.tour.first() != Some(&start) {
        freeze_first(&outcome.tour, start)
    } else {
        outcome.tour
    };

    let totals = route_totals(&tour, matrix);
    let reported = totals.reported(config.include_return_edge);

    debug!(
        "Sequenced {} waypoints in {} sweeps ({} moves, {:.0} s, {:.0} m) in {} µs",
        n,
        outcome.sweeps,
        outcome.moves,
        reported.duration_sec,
        reported.distance_meters,
        started_at.elapsed().as_micros()
    );

    Ok(OptimizationResult {
        tour,
        total_distance: reported.distance_meters,
        total_duration: reported.duration_sec,
        totals,
        sweeps: outcome.sweeps,
        moves: outcome.moves,
    })
}
