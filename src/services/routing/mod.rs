//! Routing service for cost matrix and route leg lookups
//!
//! Uses Mapbox in production, mock for tests and offline runs.

mod mapbox;

pub(crate) use mapbox::fill_unreachable;
pub use mapbox::{MapboxClient, MapboxConfig};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::services::sequencing::SequencingError;
use crate::types::Coordinates;

/// Unit of the values in a duration matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Seconds,
    Milliseconds,
    Minutes,
}

impl TimeUnit {
    /// Number of milliseconds in one unit
    const fn millis_per_unit(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1_000.0,
            TimeUnit::Milliseconds => 1.0,
            TimeUnit::Minutes => 60_000.0,
        }
    }

    /// Express a wall-clock duration in this unit
    pub fn from_duration(self, duration: chrono::Duration) -> f64 {
        duration.num_milliseconds() as f64 / self.millis_per_unit()
    }

    /// Convert a value in this unit to seconds
    pub fn to_seconds(self, value: f64) -> f64 {
        value * self.millis_per_unit() / 1_000.0
    }
}

/// Directional travel cost tables between waypoints.
///
/// `durations[i][j]` is the travel time from waypoint `i` to waypoint `j` in
/// [`TimeUnit`], `distances[i][j]` the distance in meters. Tables are square
/// and of equal size; this is checked on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    durations: Vec<Vec<f64>>,
    distances: Vec<Vec<f64>>,
    unit: TimeUnit,
}

impl CostMatrix {
    /// Create a matrix with durations in seconds
    pub fn new(
        durations: Vec<Vec<f64>>,
        distances: Vec<Vec<f64>>,
    ) -> Result<Self, SequencingError> {
        Self::with_unit(durations, distances, TimeUnit::Seconds)
    }

    /// Create a matrix with durations in the given unit
    pub fn with_unit(
        durations: Vec<Vec<f64>>,
        distances: Vec<Vec<f64>>,
        unit: TimeUnit,
    ) -> Result<Self, SequencingError> {
        ensure_square("duration", &durations)?;
        ensure_square("distance", &distances)?;
        if durations.len() != distances.len() {
            return Err(SequencingError::TableSizeMismatch {
                durations: durations.len(),
                distances: distances.len(),
            });
        }

        Ok(Self {
            durations,
            distances,
            unit,
        })
    }

    /// Create empty matrices
    pub fn empty() -> Self {
        Self {
            durations: vec![],
            distances: vec![],
            unit: TimeUnit::Seconds,
        }
    }

    /// Number of waypoints covered by the matrix
    pub fn size(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Travel time from `from` to `to` in matrix units
    pub fn duration(&self, from: usize, to: usize) -> f64 {
        self.durations[from][to]
    }

    /// Travel distance from `from` to `to` in meters
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.distances[from][to]
    }
}

fn ensure_square(table: &'static str, rows: &[Vec<f64>]) -> Result<(), SequencingError> {
    let expected = rows.len();
    match rows.iter().position(|row| row.len() != expected) {
        Some(row) => Err(SequencingError::NotSquare {
            table,
            row,
            len: rows[row].len(),
            expected,
        }),
        None => Ok(()),
    }
}

/// Route geometry as GeoJSON coordinates
/// Coordinates are in [longitude, latitude] order (GeoJSON standard)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "GeoJsonFeature", try_from = "GeoJsonFeature")]
pub struct RouteGeometry {
    /// Array of [lng, lat] coordinates forming the route polyline
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    /// Create empty geometry
    pub fn empty() -> Self {
        Self { coordinates: vec![] }
    }

    /// Create geometry from a list of coordinates (straight lines)
    pub fn from_coordinates(coords: &[Coordinates]) -> Self {
        Self {
            coordinates: coords.iter().map(|c| [c.lng, c.lat]).collect(),
        }
    }

    /// Check if geometry is empty
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// Wire form of [`RouteGeometry`]: a GeoJSON Feature wrapping a LineString
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonFeature {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    geometry: GeoJsonLineString,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeoJsonLineString {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<[f64; 2]>,
}

impl From<RouteGeometry> for GeoJsonFeature {
    fn from(geometry: RouteGeometry) -> Self {
        Self {
            kind: "Feature".to_string(),
            properties: serde_json::Map::new(),
            geometry: GeoJsonLineString {
                kind: "LineString".to_string(),
                coordinates: geometry.coordinates,
            },
        }
    }
}

impl TryFrom<GeoJsonFeature> for RouteGeometry {
    type Error = String;

    fn try_from(feature: GeoJsonFeature) -> std::result::Result<Self, Self::Error> {
        if feature.geometry.kind != "LineString" {
            return Err(format!(
                "expected LineString geometry, got {}",
                feature.geometry.kind
            ));
        }
        Ok(Self {
            coordinates: feature.geometry.coordinates,
        })
    }
}

/// Travel segment between two consecutive stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub distance_meters: f64,
    pub duration_sec: f64,
    #[serde(default = "RouteGeometry::empty")]
    pub geometry: RouteGeometry,
}

impl RouteLeg {
    /// Degraded leg used when directions for an edge are unavailable:
    /// zero cost, straight line between the two raw coordinates.
    pub fn placeholder(from: Coordinates, to: Coordinates) -> Self {
        Self {
            distance_meters: 0.0,
            duration_sec: 0.0,
            geometry: RouteGeometry::from_coordinates(&[from, to]),
        }
    }
}

/// Routing service trait for abstraction (Mapbox, mock, etc.)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Get the cost matrix for a list of locations.
    /// First location is the depot (starting point).
    async fn get_matrix(&self, locations: &[Coordinates]) -> Result<CostMatrix>;

    /// Get one leg per consecutive pair of the ordered locations
    async fn get_route_legs(&self, locations: &[Coordinates]) -> Result<Vec<RouteLeg>>;

    /// Get a single leg between two locations
    async fn get_leg(&self, from: Coordinates, to: Coordinates) -> Result<RouteLeg>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

/// Fetch legs for an ordered route, degrading instead of failing.
///
/// Tries the whole route in one request first. If that fails, legs are
/// requested edge by edge; an edge that still fails gets a placeholder leg.
pub async fn fetch_route_legs(
    service: &dyn RoutingService,
    points: &[Coordinates],
) -> Vec<RouteLeg> {
    if points.len() < 2 {
        return vec![];
    }

    let expected = points.len() - 1;
    match service.get_route_legs(points).await {
        Ok(legs) if legs.len() == expected => return legs,
        Ok(legs) => warn!(
            "{} returned {} legs for {} edges, fetching legs individually",
            service.name(),
            legs.len(),
            expected
        ),
        Err(e) => warn!(
            "{} route directions failed: {:#}. Fetching legs individually",
            service.name(),
            e
        ),
    }

    let mut legs = Vec::with_capacity(expected);
    for (i, pair) in points.windows(2).enumerate() {
        let (from, to) = (pair[0], pair[1]);
        match service.get_leg(from, to).await {
            Ok(leg) => legs.push(leg),
            Err(e) => {
                warn!("Failed to get leg {} -> {}: {:#}. Using placeholder", i, i + 1, e);
                legs.push(RouteLeg::placeholder(from, to));
            }
        }
    }
    debug!("Fetched {} legs individually", legs.len());
    legs
}

/// Mock routing service for tests
/// Uses Haversine distance × coefficient for estimation
pub struct MockRoutingService {
    /// Coefficient for converting straight-line to road distance (default: 1.3)
    road_coefficient: f64,
    /// Average speed in km/h for time estimation (default: 40)
    average_speed_kmh: f64,
}

impl Default for MockRoutingService {
    fn default() -> Self {
        Self {
            road_coefficient: 1.3,
            average_speed_kmh: 40.0,
        }
    }
}

impl MockRoutingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }

    /// Estimated (meters, seconds) between two points
    fn estimate(&self, from: &Coordinates, to: &Coordinates) -> (f64, f64) {
        use crate::services::geo::haversine_distance;

        let road_km = haversine_distance(from, to) * self.road_coefficient;
        let meters = (road_km * 1000.0).round();
        let seconds = (road_km / self.average_speed_kmh * 3600.0).round();
        (meters, seconds)
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn get_matrix(&self, locations: &[Coordinates]) -> Result<CostMatrix> {
        let n = locations.len();
        if n == 0 {
            return Ok(CostMatrix::empty());
        }

        let mut distances = vec![vec![0.0; n]; n];
        let mut durations = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let (meters, seconds) = self.estimate(&locations[i], &locations[j]);
                    distances[i][j] = meters;
                    durations[i][j] = seconds;
                }
            }
        }

        Ok(CostMatrix::new(durations, distances)?)
    }

    async fn get_route_legs(&self, locations: &[Coordinates]) -> Result<Vec<RouteLeg>> {
        let mut legs = Vec::with_capacity(locations.len().saturating_sub(1));
        for pair in locations.windows(2) {
            legs.push(self.get_leg(pair[0], pair[1]).await?);
        }
        Ok(legs)
    }

    async fn get_leg(&self, from: Coordinates, to: Coordinates) -> Result<RouteLeg> {
        let (meters, seconds) = self.estimate(&from, &to);
        Ok(RouteLeg {
            distance_meters: meters,
            duration_sec: seconds,
            geometry: RouteGeometry::from_coordinates(&[from, to]),
        })
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create routing service based on configuration
pub fn create_routing_service(config: Option<MapboxConfig>) -> Result<Arc<dyn RoutingService>> {
    match config {
        Some(cfg) => {
            info!("Using Mapbox routing service ({})", cfg.profile);
            Ok(Arc::new(MapboxClient::new(cfg)?))
        }
        None => {
            info!("Using mock routing service (Mapbox token not configured)");
            Ok(Arc::new(MockRoutingService::new()))
        }
    }
}
