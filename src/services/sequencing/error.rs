//! Input contract errors for the sequencing kernel

use thiserror::Error;

/// Rejected sequencing input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("{table} matrix is not square: row {row} has {len} entries, expected {expected}")]
    NotSquare {
        table: &'static str,
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("duration matrix is {durations}x{durations} but distance matrix is {distances}x{distances}")]
    TableSizeMismatch { durations: usize, distances: usize },

    #[error("cost matrix of size {matrix} does not match {waypoints} waypoints")]
    WaypointCountMismatch { waypoints: usize, matrix: usize },

    #[error("start index {start} is outside a cost matrix of size {size}")]
    StartOutOfRange { start: usize, size: usize },

    #[error("waypoint {0} appears more than once")]
    DuplicateWaypoint(String),

    #[error("tour row {row} has no waypoint in an index of size {size}")]
    UnknownRow { row: usize, size: usize },
}
