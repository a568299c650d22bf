//! Delivery planning workflow
//!
//! Stitches the external routing calls and the sequencing kernel together:
//! matrix fetch → optimize → leg fetch for the final order → ETAs. The two
//! network calls are awaited one after the other; everything in between is
//! pure computation.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::defaults::ALGORITHM_NAME;
use crate::services::eta_schedule::compute_etas;
use crate::services::job_lock::{JobLockRegistry, JOB_LOCKS};
use crate::services::routing::{fetch_route_legs, RouteLeg, RoutingService};
use crate::services::sequencing::{
    OptimizerConfig, SequencedRoute, SequencingProblem, Waypoint, WaypointKey,
};
use crate::types::{
    Coordinates, DeliveryError, DeliveryJob, DeliveryOrder, DeliveryStop, JobStatus, StopStatus,
};

/// Sequenced route with legs and arrival times for every stop
struct PlannedRoute {
    route: SequencedRoute,
    legs: Vec<RouteLeg>,
    etas: Vec<DateTime<Utc>>,
}

/// Planned visit of a single stop
struct PlannedVisit {
    key: WaypointKey,
    coordinates: Coordinates,
    leg: Option<RouteLeg>,
    eta: Option<DateTime<Utc>>,
}

impl PlannedRoute {
    /// Visits after the depot, in order. Leg `i` and ETA `i` belong to the
    /// waypoint at tour position `i + 1`.
    fn visits(&self) -> Vec<PlannedVisit> {
        self.route
            .waypoints
            .iter()
            .enumerate()
            .skip(1)
            .map(|(position, waypoint)| PlannedVisit {
                key: waypoint.key,
                coordinates: waypoint.coordinates,
                leg: self.legs.get(position - 1).cloned(),
                eta: self.etas.get(position - 1).copied(),
            })
            .collect()
    }
}

/// Plans and replans delivery jobs for one vehicle
pub struct DeliveryPlanner {
    routing: Arc<dyn RoutingService>,
    optimizer: OptimizerConfig,
    service_duration: Duration,
    locks: JobLockRegistry,
}

impl DeliveryPlanner {
    pub fn new(
        routing: Arc<dyn RoutingService>,
        optimizer: OptimizerConfig,
        service_duration: Duration,
    ) -> Self {
        Self {
            routing,
            // Waypoint 0 is always the depot
            optimizer: optimizer.with_start_index(0),
            service_duration,
            locks: JOB_LOCKS.clone(),
        }
    }

    pub fn with_locks(mut self, locks: JobLockRegistry) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &JobLockRegistry {
        &self.locks
    }

    /// Create a delivery job visiting every order that has coordinates
    pub async fn create_job(
        &self,
        depot: Coordinates,
        orders: &[DeliveryOrder],
        freeze_first: bool,
        start_time: DateTime<Utc>,
    ) -> Result<DeliveryJob> {
        if orders.is_empty() {
            return Err(DeliveryError::NoOrders.into());
        }

        let mut waypoints = vec![Waypoint::depot(depot)];
        for order in orders {
            match order.coordinates() {
                Some(coordinates) => waypoints.push(Waypoint::stop(order.id, coordinates)),
                None => warn!("Order {} has no delivery coordinates, skipping", order.id),
            }
        }
        if waypoints.len() == 1 {
            return Err(DeliveryError::NoCoordinates.into());
        }

        let job_id = Uuid::new_v4();
        info!("Planning delivery job {} with {} stops", job_id, waypoints.len() - 1);

        let planned = self.plan(waypoints, freeze_first, start_time).await?;
        let stops = planned
            .visits()
            .into_iter()
            .zip(1u32..)
            .filter_map(|(visit, seq)| match visit.key {
                WaypointKey::Stop(order_id) => Some(DeliveryStop {
                    id: Uuid::new_v4(),
                    order_id: Some(order_id),
                    seq,
                    lat: visit.coordinates.lat,
                    lng: visit.coordinates.lng,
                    eta: visit.eta,
                    status: StopStatus::Planned,
                    leg: visit.leg,
                }),
                WaypointKey::Depot => None,
            })
            .collect();

        let now = Utc::now();
        Ok(DeliveryJob {
            id: job_id,
            depot,
            status: JobStatus::Planned,
            algorithm: ALGORITHM_NAME.to_string(),
            totals: planned.route.result.totals.reported(self.optimizer.include_return_edge),
            stops,
            created_at: now,
            updated_at: now,
        })
    }

    /// Re-sequence the stops of `job` that are not yet delivered.
    ///
    /// A fresh matrix is built from the depot and the outstanding stops only.
    /// Delivered stops keep their relative order and are numbered first.
    pub async fn recompute_job(
        &self,
        job: &DeliveryJob,
        freeze_first: bool,
        start_time: DateTime<Utc>,
    ) -> Result<DeliveryJob> {
        let _guard = self
            .locks
            .try_acquire(job.id)
            .map_err(|_| DeliveryError::JobBusy(job.id))?;

        let outstanding = job.outstanding_stops();
        if outstanding.is_empty() {
            return Err(DeliveryError::NoRemainingStops.into());
        }

        info!(
            "Recomputing delivery job {} with {} remaining stops",
            job.id,
            outstanding.len()
        );

        let mut waypoints = vec![Waypoint::depot(job.depot)];
        waypoints.extend(
            outstanding
                .iter()
                .map(|stop| Waypoint::stop(stop.id, stop.coordinates())),
        );

        let planned = self.plan(waypoints, freeze_first, start_time).await?;

        let mut delivered: Vec<&DeliveryStop> =
            job.stops.iter().filter(|s| !s.is_outstanding()).collect();
        delivered.sort_by_key(|s| s.seq);
        let first_open_seq = delivered.len() as u32 + 1;

        let mut seqs: HashMap<Uuid, u32> = delivered
            .iter()
            .zip(1u32..)
            .map(|(stop, seq)| (stop.id, seq))
            .collect();
        let mut visits: HashMap<Uuid, PlannedVisit> = HashMap::new();
        for (visit, seq) in planned.visits().into_iter().zip(first_open_seq..) {
            if let WaypointKey::Stop(stop_id) = visit.key {
                seqs.insert(stop_id, seq);
                visits.insert(stop_id, visit);
            }
        }

        let mut updated = job.clone();
        for stop in updated.stops.iter_mut() {
            if let Some(&seq) = seqs.get(&stop.id) {
                stop.seq = seq;
            }
            if let Some(visit) = visits.remove(&stop.id) {
                stop.eta = visit.eta;
                if visit.leg.is_some() {
                    stop.leg = visit.leg;
                }
            }
        }
        updated.stops.sort_by_key(|s| s.seq);
        updated.totals = planned.route.result.totals.reported(self.optimizer.include_return_edge);
        updated.updated_at = Utc::now();

        Ok(updated)
    }

    /// Matrix → optimized tour → legs → ETAs for the given waypoints
    async fn plan(
        &self,
        waypoints: Vec<Waypoint>,
        freeze_first: bool,
        start_time: DateTime<Utc>,
    ) -> Result<PlannedRoute> {
        let locations: Vec<Coordinates> = waypoints.iter().map(|w| w.coordinates).collect();

        debug!(
            "Requesting cost matrix from {} for {} waypoints",
            self.routing.name(),
            locations.len()
        );
        let matrix = self.routing.get_matrix(&locations).await?;

        let problem = SequencingProblem::new(waypoints, matrix).map_err(DeliveryError::from)?;
        let config = self.optimizer.clone().with_freeze_first(freeze_first);
        let route = problem.solve(&config).map_err(DeliveryError::from)?;

        let legs = fetch_route_legs(self.routing.as_ref(), &route.coordinates()).await;
        let etas = compute_etas(&legs, start_time, self.service_duration);

        info!(
            "Route planned: {} stops, {:.1} km, {:.0} min",
            route.waypoints.len().saturating_sub(1),
            route.result.total_distance / 1000.0,
            route.result.total_duration / 60.0
        );

        Ok(PlannedRoute { route, legs, etas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::routing::{CostMatrix, MockRoutingService};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    /// Mock provider that records the size of every matrix request
    #[derive(Default)]
    struct RecordingRoutingService {
        inner: MockRoutingService,
        matrix_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RoutingService for RecordingRoutingService {
        async fn get_matrix(&self, locations: &[Coordinates]) -> Result<CostMatrix> {
            self.matrix_sizes.lock().push(locations.len());
            self.inner.get_matrix(locations).await
        }

        async fn get_route_legs(&self, locations: &[Coordinates]) -> Result<Vec<RouteLeg>> {
            self.inner.get_route_legs(locations).await
        }

        async fn get_leg(&self, from: Coordinates, to: Coordinates) -> Result<RouteLeg> {
            self.inner.get_leg(from, to).await
        }

        fn name(&self) -> &str {
            "Recording"
        }
    }

    /// Provider whose matrix endpoint is down
    struct FailingMatrixService;

    #[async_trait]
    impl RoutingService for FailingMatrixService {
        async fn get_matrix(&self, _locations: &[Coordinates]) -> Result<CostMatrix> {
            anyhow::bail!("Matrix API supports maximum 25 points")
        }

        async fn get_route_legs(&self, _locations: &[Coordinates]) -> Result<Vec<RouteLeg>> {
            unreachable!("legs are never requested without a matrix")
        }

        async fn get_leg(&self, _from: Coordinates, _to: Coordinates) -> Result<RouteLeg> {
            unreachable!("legs are never requested without a matrix")
        }

        fn name(&self) -> &str {
            "FailingMatrix"
        }
    }

    /// Provider returning a matrix sized for a different waypoint list
    struct WrongSizeMatrixService;

    #[async_trait]
    impl RoutingService for WrongSizeMatrixService {
        async fn get_matrix(&self, locations: &[Coordinates]) -> Result<CostMatrix> {
            let n = locations.len() - 1;
            Ok(CostMatrix::new(vec![vec![0.0; n]; n], vec![vec![0.0; n]; n])?)
        }

        async fn get_route_legs(&self, _locations: &[Coordinates]) -> Result<Vec<RouteLeg>> {
            Ok(vec![])
        }

        async fn get_leg(&self, from: Coordinates, to: Coordinates) -> Result<RouteLeg> {
            Ok(RouteLeg::placeholder(from, to))
        }

        fn name(&self) -> &str {
            "WrongSize"
        }
    }

    fn depot() -> Coordinates {
        Coordinates::new(50.0870, 14.4208)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap()
    }

    fn order(lat: f64, lng: f64) -> DeliveryOrder {
        DeliveryOrder {
            id: Uuid::new_v4(),
            delivery_lat: Some(lat),
            delivery_lng: Some(lng),
        }
    }

    fn orders() -> Vec<DeliveryOrder> {
        vec![
            order(50.1000, 14.4500),
            order(50.0800, 14.4000),
            order(50.0900, 14.4300),
        ]
    }

    fn planner(routing: Arc<dyn RoutingService>) -> DeliveryPlanner {
        DeliveryPlanner::new(routing, OptimizerConfig::default(), Duration::minutes(3))
            .with_locks(JobLockRegistry::default())
    }

    #[tokio::test]
    async fn test_create_job_plans_every_order() {
        let planner = planner(Arc::new(MockRoutingService::new()));
        let orders = orders();

        let job = planner.create_job(depot(), &orders, false, start()).await.unwrap();

        assert_eq!(job.status, JobStatus::Planned);
        assert_eq!(job.algorithm, "nearest-neighbor-2opt");
        assert_eq!(job.stops.len(), 3);
        assert_eq!(job.stops.iter().map(|s| s.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(job.totals.duration_sec > 0.0);

        let mut order_ids: Vec<Uuid> = job.stops.iter().filter_map(|s| s.order_id).collect();
        let mut expected: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        order_ids.sort();
        expected.sort();
        assert_eq!(order_ids, expected);
    }

    #[tokio::test]
    async fn test_create_job_stops_match_their_orders() {
        let planner = planner(Arc::new(MockRoutingService::new()));
        let orders = orders();

        let job = planner.create_job(depot(), &orders, false, start()).await.unwrap();

        for stop in &job.stops {
            let order = orders.iter().find(|o| Some(o.id) == stop.order_id).unwrap();
            assert_eq!(Some(stop.coordinates()), order.coordinates());

            // Each leg ends at its own stop
            let leg = stop.leg.as_ref().unwrap();
            assert_eq!(leg.geometry.coordinates.last(), Some(&[stop.lng, stop.lat]));
        }
    }

    #[tokio::test]
    async fn test_create_job_etas_follow_legs() {
        let planner = planner(Arc::new(MockRoutingService::new()));

        let job = planner.create_job(depot(), &orders(), false, start()).await.unwrap();

        let first = &job.stops[0];
        let travel = first.leg.as_ref().unwrap().duration_sec as i64;
        assert_eq!(first.eta, Some(start() + Duration::seconds(travel)));
        assert!(job.stops.windows(2).all(|w| w[0].eta <= w[1].eta));
    }

    #[tokio::test]
    async fn test_create_job_totals_are_open_path() {
        let planner = planner(Arc::new(MockRoutingService::new()));

        let job = planner.create_job(depot(), &orders(), false, start()).await.unwrap();

        let leg_sum: f64 = job.stops.iter().filter_map(|s| s.leg.as_ref()).map(|l| l.duration_sec).sum();
        assert!((job.totals.duration_sec - leg_sum).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_create_job_skips_orders_without_coordinates() {
        let planner = planner(Arc::new(MockRoutingService::new()));
        let mut orders = orders();
        orders.push(DeliveryOrder {
            id: Uuid::new_v4(),
            delivery_lat: None,
            delivery_lng: None,
        });

        let job = planner.create_job(depot(), &orders, false, start()).await.unwrap();
        assert_eq!(job.stops.len(), 3);
    }

    #[tokio::test]
    async fn test_create_job_rejects_empty_orders() {
        let planner = planner(Arc::new(MockRoutingService::new()));

        let err = planner.create_job(depot(), &[], false, start()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DeliveryError>(), Some(DeliveryError::NoOrders)));
    }

    #[tokio::test]
    async fn test_create_job_rejects_orders_without_any_coordinates() {
        let planner = planner(Arc::new(MockRoutingService::new()));
        let orders = vec![DeliveryOrder {
            id: Uuid::new_v4(),
            delivery_lat: Some(50.0),
            delivery_lng: None,
        }];

        let err = planner.create_job(depot(), &orders, false, start()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeliveryError>(),
            Some(DeliveryError::NoCoordinates)
        ));
    }

    #[tokio::test]
    async fn test_matrix_failure_aborts_unmodified() {
        let planner = planner(Arc::new(FailingMatrixService));

        let err = planner.create_job(depot(), &orders(), false, start()).await.unwrap_err();
        assert_eq!(err.to_string(), "Matrix API supports maximum 25 points");
    }

    #[tokio::test]
    async fn test_wrong_size_matrix_rejected() {
        let planner = planner(Arc::new(WrongSizeMatrixService));

        let err = planner.create_job(depot(), &orders(), false, start()).await.unwrap_err();
        assert!(err.to_string().contains("cost matrix of size 3 does not match 4 waypoints"));
    }

    #[tokio::test]
    async fn test_recompute_uses_only_outstanding_stops() {
        let routing = Arc::new(RecordingRoutingService::default());
        let planner = planner(routing.clone());

        let mut job = planner.create_job(depot(), &orders(), false, start()).await.unwrap();
        let delivered_id = job.stops[0].id;
        job.mark_delivered(delivered_id).unwrap();

        let later = start() + Duration::minutes(30);
        let updated = planner.recompute_job(&job, false, later).await.unwrap();

        assert_eq!(*routing.matrix_sizes.lock(), vec![4, 3]);
        assert_eq!(updated.stops.len(), 3);
        assert_eq!(updated.stops.iter().map(|s| s.seq).collect::<Vec<_>>(), vec![1, 2, 3]);

        let delivered = updated.stops.iter().find(|s| s.id == delivered_id).unwrap();
        assert_eq!(delivered.seq, 1);
        assert_eq!(delivered.eta, job.stops[0].eta);
        assert!(updated
            .stops
            .iter()
            .filter(|s| s.is_outstanding())
            .all(|s| s.eta.is_some_and(|eta| eta > later)));
    }

    #[tokio::test]
    async fn test_recompute_rejects_fully_delivered_job() {
        let planner = planner(Arc::new(MockRoutingService::new()));
        let mut job = planner.create_job(depot(), &orders(), false, start()).await.unwrap();
        let ids: Vec<Uuid> = job.stops.iter().map(|s| s.id).collect();
        for id in ids {
            job.mark_delivered(id).unwrap();
        }
        assert_eq!(job.status, JobStatus::Completed);

        let err = planner.recompute_job(&job, false, start()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeliveryError>(),
            Some(DeliveryError::NoRemainingStops)
        ));
    }

    #[tokio::test]
    async fn test_recompute_rejected_while_job_locked() {
        let planner = planner(Arc::new(MockRoutingService::new()));
        let job = planner.create_job(depot(), &orders(), false, start()).await.unwrap();

        let _guard = planner.locks().try_acquire(job.id).unwrap();

        let err = planner.recompute_job(&job, false, start()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeliveryError>(),
            Some(DeliveryError::JobBusy(id)) if *id == job.id
        ));
    }

    #[tokio::test]
    async fn test_recompute_releases_lock() {
        let planner = planner(Arc::new(MockRoutingService::new()));
        let job = planner.create_job(depot(), &orders(), false, start()).await.unwrap();

        planner.recompute_job(&job, true, start()).await.unwrap();
        assert!(!planner.locks().is_locked(&job.id));
    }
}
