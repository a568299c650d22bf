//! Route metrics aggregation

use serde::{Deserialize, Serialize};

use crate::services::routing::CostMatrix;

/// Travel distance and time of a tour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub distance_meters: f64,
    pub duration_sec: f64,
}

/// Totals for both readings of a tour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTotals {
    /// Depot through the last stop, no return
    pub open_path: Metrics,
    /// Open path plus the edge from the last stop back to the first
    pub closed_cycle: Metrics,
}

impl RouteTotals {
    pub fn reported(&self, include_return_edge: bool) -> Metrics {
        if include_return_edge {
            self.closed_cycle
        } else {
            self.open_path
        }
    }
}

/// Sum matrix costs along `tour`. Durations are converted to seconds.
pub fn route_totals(tour: &[usize], matrix: &CostMatrix) -> RouteTotals {
    let unit = matrix.unit();
    let mut open = Metrics::default();

    for pair in tour.windows(2) {
        open.distance_meters += matrix.distance(pair[0], pair[1]);
        open.duration_sec += unit.to_seconds(matrix.duration(pair[0], pair[1]));
    }

    let mut closed = open;
    if let (Some(&first), Some(&last)) = (tour.first(), tour.last()) {
        if tour.len() > 1 {
            closed.distance_meters += matrix.distance(last, first);
            closed.duration_sec += unit.to_seconds(matrix.duration(last, first));
        }
    }

    RouteTotals {
        open_path: open,
        closed_cycle: closed,
    }
}
