//! Sequencing problem definition: waypoints bound to a cost matrix

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optimize_route, OptimizationResult, OptimizerConfig, SequencingError};
use crate::services::routing::CostMatrix;
use crate::types::Coordinates;

/// Identity of a waypoint, independent of its matrix position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum WaypointKey {
    Depot,
    Stop(Uuid),
}

impl fmt::Display for WaypointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaypointKey::Depot => write!(f, "depot"),
            WaypointKey::Stop(id) => write!(f, "stop {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub key: WaypointKey,
    pub coordinates: Coordinates,
}

impl Waypoint {
    pub fn depot(coordinates: Coordinates) -> Self {
        Self {
            key: WaypointKey::Depot,
            coordinates,
        }
    }

    pub fn stop(id: Uuid, coordinates: Coordinates) -> Self {
        Self {
            key: WaypointKey::Stop(id),
            coordinates,
        }
    }
}

/// Mapping between waypoint keys and matrix rows/columns
#[derive(Debug, Clone, Default)]
pub struct WaypointIndex {
    keys: Vec<WaypointKey>,
    rows: HashMap<WaypointKey, usize>,
}

impl WaypointIndex {
    /// Index waypoints in the order they were sent to the matrix provider
    pub fn new(waypoints: &[Waypoint]) -> Result<Self, SequencingError> {
        let mut rows = HashMap::with_capacity(waypoints.len());
        for (row, waypoint) in waypoints.iter().enumerate() {
            if rows.insert(waypoint.key, row).is_some() {
                return Err(SequencingError::DuplicateWaypoint(waypoint.key.to_string()));
            }
        }

        Ok(Self {
            keys: waypoints.iter().map(|w| w.key).collect(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn row_of(&self, key: &WaypointKey) -> Option<usize> {
        self.rows.get(key).copied()
    }

    pub fn key_at(&self, row: usize) -> Option<WaypointKey> {
        self.keys.get(row).copied()
    }
}

/// Waypoints plus the matrix computed for them
#[derive(Debug, Clone)]
pub struct SequencingProblem {
    index: WaypointIndex,
    coordinates: HashMap<WaypointKey, Coordinates>,
    matrix: CostMatrix,
}

/// Optimized tour translated back to waypoints
#[derive(Debug, Clone)]
pub struct SequencedRoute {
    pub result: OptimizationResult,
    /// Waypoints in visiting order
    pub waypoints: Vec<Waypoint>,
}

impl SequencedRoute {
    pub fn coordinates(&self) -> Vec<Coordinates> {
        self.waypoints.iter().map(|w| w.coordinates).collect()
    }
}

impl SequencingProblem {
    /// Bind waypoints to their matrix, rejecting a matrix of the wrong size
    pub fn new(waypoints: Vec<Waypoint>, matrix: CostMatrix) -> Result<Self, SequencingError> {
        if waypoints.len() != matrix.size() {
            return Err(SequencingError::WaypointCountMismatch {
                waypoints: waypoints.len(),
                matrix: matrix.size(),
            });
        }
        let index = WaypointIndex::new(&waypoints)?;
        let coordinates = waypoints.iter().map(|w| (w.key, w.coordinates)).collect();

        Ok(Self {
            index,
            coordinates,
            matrix,
        })
    }

    /// Run the optimizer and map the tour back to waypoints
    pub fn solve(&self, config: &OptimizerConfig) -> Result<SequencedRoute, SequencingError> {
        let result = optimize_route(&self.matrix, config)?;
        let waypoints = self.waypoints_for(&result.tour)?;

        Ok(SequencedRoute { result, waypoints })
    }

    /// Translate matrix rows back to waypoints through the key index
    fn waypoints_for(&self, tour: &[usize]) -> Result<Vec<Waypoint>, SequencingError> {
        tour.iter()
            .map(|&row| {
                let missing = || SequencingError::UnknownRow {
                    row,
                    size: self.index.len(),
                };
                let key = self.index.key_at(row).ok_or_else(missing)?;
                let coordinates = self.coordinates.get(&key).copied().ok_or_else(missing)?;
                Ok(Waypoint { key, coordinates })
            })
            .collect()
    }
}
