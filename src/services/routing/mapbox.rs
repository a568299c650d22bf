//! Mapbox routing client
//!
//! Mapbox API documentation:
//! https://docs.mapbox.com/api/navigation/matrix/
//! https://docs.mapbox.com/api/navigation/directions/

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CostMatrix, RouteGeometry, RouteLeg, RoutingService};
use crate::defaults::MAX_MATRIX_COORDINATES;
use crate::types::Coordinates;

/// Mapbox client configuration
#[derive(Debug, Clone)]
pub struct MapboxConfig {
    /// Base URL of the Mapbox API (e.g., "https://api.mapbox.com")
    pub base_url: String,
    /// Access token sent with every request
    pub access_token: String,
    /// Routing profile, e.g. "mapbox/driving-traffic"
    pub profile: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Largest coordinate count accepted by the Matrix API
    pub max_matrix_coordinates: usize,
}

impl Default for MapboxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mapbox.com".to_string(),
            access_token: String::new(),
            profile: "mapbox/driving-traffic".to_string(),
            timeout_seconds: 30,
            max_matrix_coordinates: MAX_MATRIX_COORDINATES,
        }
    }
}

impl MapboxConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }
}

/// Mapbox routing client
pub struct MapboxClient {
    client: Client,
    config: MapboxConfig,
}

impl MapboxClient {
    pub fn new(config: MapboxConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// `lng,lat;lng,lat;...` path segment
    fn coordinate_path(locations: &[Coordinates]) -> String {
        locations
            .iter()
            .map(|c| format!("{},{}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";")
    }

    fn matrix_url(&self, locations: &[Coordinates]) -> String {
        format!(
            "{}/directions-matrix/v1/{}/{}",
            self.config.base_url,
            self.config.profile,
            Self::coordinate_path(locations)
        )
    }

    fn directions_url(&self, locations: &[Coordinates]) -> String {
        format!(
            "{}/directions/v5/{}/{}",
            self.config.base_url,
            self.config.profile,
            Self::coordinate_path(locations)
        )
    }

    async fn get_directions(
        &self,
        locations: &[Coordinates],
        steps: bool,
    ) -> Result<DirectionsRoute> {
        let url = self.directions_url(locations);
        let steps = if steps { "true" } else { "false" };

        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_token", self.config.access_token.as_str()),
                ("geometries", "geojson"),
                ("overview", "full"),
                ("steps", steps),
            ])
            .send()
            .await
            .context("Failed to send directions request to Mapbox")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mapbox directions returned error {}: {}", status, body);
        }

        let directions: DirectionsResponse = response
            .json()
            .await
            .context("Failed to parse Mapbox directions response")?;

        if directions.code != "Ok" {
            anyhow::bail!(
                "Mapbox directions returned {}: {}",
                directions.code,
                directions.message.unwrap_or_default()
            );
        }

        directions
            .routes
            .into_iter()
            .next()
            .context("No route found for sequence")
    }
}

#[async_trait]
impl RoutingService for MapboxClient {
    async fn get_matrix(&self, locations: &[Coordinates]) -> Result<CostMatrix> {
        let n = locations.len();

        if n == 0 {
            return Ok(CostMatrix::empty());
        }

        if n == 1 {
            return Ok(CostMatrix::new(vec![vec![0.0]], vec![vec![0.0]])?);
        }

        if n > self.config.max_matrix_coordinates {
            anyhow::bail!(
                "Matrix API supports maximum {} points, got {}",
                self.config.max_matrix_coordinates,
                n
            );
        }

        let url = self.matrix_url(locations);

        debug!("Requesting cost matrix from Mapbox for {} locations", n);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("access_token", self.config.access_token.as_str()),
                ("annotations", "duration,distance"),
            ])
            .send()
            .await
            .context("Failed to send matrix request to Mapbox")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mapbox matrix returned error {}: {}", status, body);
        }

        let matrix_response: MatrixResponse = response
            .json()
            .await
            .context("Failed to parse Mapbox matrix response")?;

        let matrix = matrix_response.into_cost_matrix(n)?;
        debug!("Received cost matrix from Mapbox: {}x{}", n, n);
        Ok(matrix)
    }

    async fn get_route_legs(&self, locations: &[Coordinates]) -> Result<Vec<RouteLeg>> {
        if locations.len() < 2 {
            return Ok(vec![]);
        }

        debug!("Requesting directions from Mapbox for {} locations", locations.len());
        let route = self.get_directions(locations, true).await?;
        let legs = split_route_geometry(&route.geometry.coordinates, &route.legs);
        debug!(
            "Received {} legs with {} geometry points",
            legs.len(),
            route.geometry.coordinates.len()
        );
        Ok(legs)
    }

    async fn get_leg(&self, from: Coordinates, to: Coordinates) -> Result<RouteLeg> {
        let route = self.get_directions(&[from, to], false).await?;
        Ok(RouteLeg {
            distance_meters: route.distance,
            duration_sec: route.duration,
            geometry: RouteGeometry {
                coordinates: route.geometry.coordinates,
            },
        })
    }

    fn name(&self) -> &str {
        "Mapbox"
    }
}

/// Split the full route polyline into per-leg geometries.
///
/// Each leg receives a share of the points proportional to its distance
/// (at least two), and consecutive legs overlap by one point.
fn split_route_geometry(full: &[[f64; 2]], legs: &[DirectionsLeg]) -> Vec<RouteLeg> {
    let total_distance: f64 = legs.iter().map(|l| l.distance).sum();
    let mut current = 0usize;
    let mut result = Vec::with_capacity(legs.len());

    for leg in legs {
        let proportion = if total_distance > 0.0 {
            leg.distance / total_distance
        } else {
            1.0 / legs.len() as f64
        };
        let count = ((full.len() as f64 * proportion).floor() as usize).max(2);
        let end = (current + count).min(full.len());
        let start = current.min(end);

        result.push(RouteLeg {
            distance_meters: leg.distance,
            duration_sec: leg.duration,
            geometry: RouteGeometry {
                coordinates: full[start..end].to_vec(),
            },
        });

        current = end.saturating_sub(1);
    }

    result
}

// Mapbox API types

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    /// Seconds, `null` when no route exists
    #[serde(default)]
    durations: Option<Vec<Vec<Option<f64>>>>,
    /// Meters, `null` when no route exists
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl MatrixResponse {
    fn into_cost_matrix(self, n: usize) -> Result<CostMatrix> {
        if self.code != "Ok" {
            anyhow::bail!(
                "Mapbox matrix returned {}: {}",
                self.code,
                self.message.unwrap_or_default()
            );
        }

        let durations = self.durations.context("Mapbox matrix response has no durations")?;
        let distances = self.distances.context("Mapbox matrix response has no distances")?;
        if durations.len() != n || distances.len() != n {
            anyhow::bail!(
                "Mapbox matrix has {} rows for {} locations",
                durations.len(),
                n
            );
        }

        Ok(CostMatrix::new(
            fill_unreachable("duration", durations),
            fill_unreachable("distance", distances),
        )?)
    }
}

/// Replace `null` cells with `+inf`, logging each unreachable pair
pub(crate) fn fill_unreachable(table: &str, rows: Vec<Vec<Option<f64>>>) -> Vec<Vec<f64>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.into_iter()
                .enumerate()
                .map(|(j, cell)| {
                    cell.unwrap_or_else(|| {
                        warn!("No {} for route {} -> {}", table, i, j);
                        f64::INFINITY
                    })
                })
                .collect()
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    distance: f64,
    duration: f64,
    geometry: LineString,
    #[serde(default)]
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct LineString {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    distance: f64,
    duration: f64,
}
