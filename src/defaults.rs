use chrono::Duration;

/// Time spent at each stop before driving on
pub const DEFAULT_SERVICE_DURATION_MINUTES: i64 = 3;

/// Upper bound on 2-opt sweeps per optimization
pub const DEFAULT_MAX_SWEEPS: usize = 50;

/// Matrix providers in this domain cap waypoint count at 25
pub const MAX_MATRIX_COORDINATES: usize = 25;

/// Name recorded on delivery jobs
pub const ALGORITHM_NAME: &str = "nearest-neighbor-2opt";

/// Smallest 2-opt gain worth applying
pub fn default_improvement_threshold() -> Duration {
    Duration::seconds(1)
}
