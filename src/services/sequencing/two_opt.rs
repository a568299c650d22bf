//! 2-opt local search (best improvement).
//!
//! # Algorithm
//!
//! Each sweep evaluates every segment `route[i..=j]` with `1 <= i < n-2` and
//! `i < j < n`, and the gain of reversing it:
//!
//! ```text
//! gain = d(r[i-1], r[i]) + d(r[j], r[j+1]) - d(r[i-1], r[j]) - d(r[i], r[j+1])
//! ```
//!
//! where `r[j+1]` wraps to `r[0]` on a closed tour and is absent on an open
//! path ending at `r[j]`. Costs are directional, so the gain also includes the
//! change from traversing the segment backwards (zero for symmetric matrices).
//! Only the best move of a sweep is applied, and only if its gain exceeds the
//! threshold. Position 0 never moves.
//!
//! # Complexity
//!
//! O(n³) per sweep, bounded by the sweep cap.

use crate::services::routing::CostMatrix;

/// Result of a local search run
#[derive(Debug, Clone, PartialEq)]
pub struct TwoOptOutcome {
    pub tour: Vec<usize>,
    /// Sweeps evaluated
    pub sweeps: usize,
    /// Reversals applied
    pub moves: usize,
}

/// Improve `tour` and return the new order.
///
/// `threshold` is in matrix duration units. `closed` selects the closed-cycle
/// cost model (last stop connects back to the first).
pub fn two_opt(
    tour: &[usize],
    matrix: &CostMatrix,
    max_sweeps: usize,
    threshold: f64,
    closed: bool,
) -> Vec<usize> {
    two_opt_with_stats(tour, matrix, max_sweeps, threshold, closed).tour
}

/// Same as [`two_opt`], also reporting how much work was done
pub fn two_opt_with_stats(
    tour: &[usize],
    matrix: &CostMatrix,
    max_sweeps: usize,
    threshold: f64,
    closed: bool,
) -> TwoOptOutcome {
    let mut route = tour.to_vec();
    let n = route.len();
    let mut sweeps = 0;
    let mut moves = 0;

    if n < 4 {
        return TwoOptOutcome { tour: route, sweeps, moves };
    }

    while sweeps < max_sweeps {
        sweeps += 1;

        let mut best_gain = 0.0;
        let mut best_move = None;

        for i in 1..n - 2 {
            for j in i + 1..n {
                let gain = reversal_gain(&route, matrix, i, j, closed);
                if gain > best_gain {
                    best_gain = gain;
                    best_move = Some((i, j));
                }
            }
        }

        match best_move {
            Some((i, j)) if best_gain > threshold => {
                route[i..=j].reverse();
                moves += 1;
            }
            _ => break,
        }
    }

    TwoOptOutcome { tour: route, sweeps, moves }
}

/// Cost saved by reversing `route[i..=j]` (positive means cheaper)
fn reversal_gain(route: &[usize], matrix: &CostMatrix, i: usize, j: usize, closed: bool) -> f64 {
    let n = route.len();
    let prev = route[i - 1];

    let mut removed = matrix.duration(prev, route[i]);
    let mut added = matrix.duration(prev, route[j]);

    let next = if j + 1 < n {
        Some(route[j + 1])
    } else if closed {
        Some(route[0])
    } else {
        None
    };
    if let Some(next) = next {
        removed += matrix.duration(route[j], next);
        added += matrix.duration(route[i], next);
    }

    for k in i..j {
        removed += matrix.duration(route[k], route[k + 1]);
        added += matrix.duration(route[k + 1], route[k]);
    }

    removed - added
}
