//! Greedy nearest-neighbor tour construction.

use super::SequencingError;
use crate::services::routing::CostMatrix;

/// Build an initial tour starting at `start`, always moving to the
/// unvisited waypoint with the shortest travel time.
///
/// Ties go to the lowest index. Unreachable edges (`+inf`) are still valid
/// moves: when nothing finite is left the lowest unvisited index is taken,
/// so the tour always covers every waypoint.
pub fn nearest_neighbor(matrix: &CostMatrix, start: usize) -> Result<Vec<usize>, SequencingError> {
    let n = matrix.size();
    if n == 0 {
        return Ok(vec![]);
    }
    if start >= n {
        return Err(SequencingError::StartOutOfRange { start, size: n });
    }

    let mut visited = vec![false; n];
    let mut tour = Vec::with_capacity(n);
    visited[start] = true;
    tour.push(start);
    let mut current = start;

    for _ in 1..n {
        let mut nearest = None;
        let mut best = f64::INFINITY;

        for j in 0..n {
            if !visited[j] && matrix.duration(current, j) < best {
                best = matrix.duration(current, j);
                nearest = Some(j);
            }
        }

        let Some(next) = nearest.or_else(|| visited.iter().position(|v| !v)) else {
            break;
        };

        visited[next] = true;
        tour.push(next);
        current = next;
    }

    Ok(tour)
}
