//! Delivery job types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Coordinates;
use crate::services::routing::RouteLeg;
use crate::services::sequencing::{Metrics, SequencingError};

/// Delivery job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Planned,
    InProgress,
    Completed,
    Canceled,
}

/// Delivery stop status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopStatus {
    Planned,
    EnRoute,
    Delivered,
    Skipped,
    Failed,
}

/// An order handed to the planner for delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub delivery_lat: Option<f64>,
    pub delivery_lng: Option<f64>,
}

impl DeliveryOrder {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.delivery_lat, self.delivery_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        }
    }
}

/// A stop on a delivery job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStop {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    /// 1-based visiting position
    pub seq: u32,
    pub lat: f64,
    pub lng: f64,
    pub eta: Option<DateTime<Utc>>,
    pub status: StopStatus,
    pub leg: Option<RouteLeg>,
}

impl DeliveryStop {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lng: self.lng,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.status != StopStatus::Delivered
    }
}

/// Delivery job (one vehicle run from the depot)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryJob {
    pub id: Uuid,
    pub depot: Coordinates,
    pub status: JobStatus,
    pub algorithm: String,
    pub totals: Metrics,
    pub stops: Vec<DeliveryStop>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryJob {
    /// Stops not yet delivered, in current sequence order
    pub fn outstanding_stops(&self) -> Vec<&DeliveryStop> {
        let mut stops: Vec<&DeliveryStop> =
            self.stops.iter().filter(|s| s.is_outstanding()).collect();
        stops.sort_by_key(|s| s.seq);
        stops
    }

    /// Mark a stop delivered. The job completes once no stop is outstanding.
    pub fn mark_delivered(&mut self, stop_id: Uuid) -> Result<(), DeliveryError> {
        let stop = self
            .stops
            .iter_mut()
            .find(|s| s.id == stop_id)
            .ok_or(DeliveryError::StopNotFound(stop_id))?;

        stop.status = StopStatus::Delivered;
        self.updated_at = Utc::now();

        if self.stops.iter().all(|s| !s.is_outstanding()) {
            self.status = JobStatus::Completed;
        }
        Ok(())
    }
}

/// Request to plan a new delivery job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDeliveryRequest {
    pub depot: Coordinates,
    pub orders: Vec<DeliveryOrder>,
    #[serde(default)]
    pub freeze_first: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// Errors of the delivery workflow
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no orders to deliver")]
    NoOrders,

    #[error("no orders with valid delivery coordinates")]
    NoCoordinates,

    #[error("no remaining stops to optimize")]
    NoRemainingStops,

    #[error("delivery stop {0} not found")]
    StopNotFound(Uuid),

    #[error("delivery job {0} is already being optimized")]
    JobBusy(Uuid),

    #[error(transparent)]
    Sequencing(#[from] SequencingError),
}
