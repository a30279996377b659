use crate::provider::{RouteProvider, RoutingError};
use dashmap::{DashMap, DashSet};
use shared::{GeoPoint, Route, Vehicle, VehicleId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A provider answer waiting to be swapped in the next time its vehicle is
/// advanced.
#[derive(Debug, Clone)]
struct Resolution {
    replaces: Uuid,
    route: Route,
}

/// Marks a vehicle as having a resolution in flight. Dropping it clears the
/// mark however the task ends. A task that ends without settling, through a
/// provider panic or an abort, is recorded as a failure so the vehicle backs
/// off like any other failed lookup.
struct PendingGuard {
    vehicle_id: VehicleId,
    pending: Arc<DashSet<VehicleId>>,
    failures: Arc<DashMap<VehicleId, Instant>>,
    settled: bool,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(vehicle_id = %self.vehicle_id, "Route resolution ended abruptly");
            self.failures.insert(self.vehicle_id, Instant::now());
        }
        self.pending.remove(&self.vehicle_id);
    }
}

/// Moves vehicles along their routes and upgrades synthetic routes to
/// provider-resolved ones in the background.
///
/// At most one resolution is in flight per vehicle. Results land in an
/// inbox and are applied by [`RouteEngine::advance`], so the background task
/// never touches a vehicle directly.
pub struct RouteEngine {
    provider: Arc<dyn RouteProvider>,
    pending: Arc<DashSet<VehicleId>>,
    inbox: Arc<DashMap<VehicleId, Resolution>>,
    failures: Arc<DashMap<VehicleId, Instant>>,
    retry_after: Duration,
}

impl RouteEngine {
    pub fn new(provider: Arc<dyn RouteProvider>, retry_after: Duration) -> Self {
        Self {
            provider,
            pending: Arc::new(DashSet::new()),
            inbox: Arc::new(DashMap::new()),
            failures: Arc::new(DashMap::new()),
            retry_after,
        }
    }

    /// Steps the vehicle one waypoint forward. Past the last waypoint the
    /// route loops back to its start. A vehicle without a route is left
    /// alone.
    pub fn advance(&self, vehicle: &mut Vehicle) {
        self.apply_resolved(vehicle);

        let Some(route) = vehicle.route.as_ref() else {
            return;
        };
        if route.is_empty() {
            return;
        }

        let next = (vehicle.route_index + 1) % route.len();
        let synthetic = route.is_synthetic();
        vehicle.position = route.waypoints[next];
        vehicle.route_index = next;
        vehicle.moving = true;

        if synthetic && !self.in_backoff(vehicle.id) {
            self.resolve_external_route(vehicle);
        }
    }

    /// Asks the provider for a real path matching the vehicle's synthetic
    /// route, off the caller's task. Returns `None` when nothing was
    /// dispatched: no synthetic route, a request already outstanding for
    /// this vehicle, or no runtime to run it on.
    pub fn resolve_external_route(&self, vehicle: &Vehicle) -> Option<JoinHandle<()>> {
        let route = vehicle.route.as_ref().filter(|r| r.is_synthetic())?;
        let (from, to) = (route.origin()?, route.destination()?);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!(vehicle_id = %vehicle.id, "No runtime, skipping route resolution");
                return None;
            }
        };

        if !self.pending.insert(vehicle.id) {
            return None;
        }

        let vehicle_id = vehicle.id;
        let replaces = route.id;
        let provider = self.provider.clone();
        let inbox = self.inbox.clone();
        let failures = self.failures.clone();
        let mut guard = PendingGuard {
            vehicle_id,
            pending: self.pending.clone(),
            failures: self.failures.clone(),
            settled: false,
        };

        Some(runtime.spawn(async move {
            match provider.route(from, to).await {
                Ok(path) if !path.waypoints.is_empty() => {
                    tracing::debug!(
                        vehicle_id = %vehicle_id,
                        waypoints = path.waypoints.len(),
                        "Route resolved"
                    );
                    failures.remove(&vehicle_id);
                    inbox.insert(
                        vehicle_id,
                        Resolution {
                            replaces,
                            route: path.into_route(),
                        },
                    );
                }
                Ok(_) => {
                    tracing::warn!(vehicle_id = %vehicle_id, "Provider returned an empty route, staying on synthetic route");
                    failures.insert(vehicle_id, Instant::now());
                }
                Err(e) => {
                    tracing::warn!(vehicle_id = %vehicle_id, error = %e, "Route resolution failed, staying on synthetic route");
                    failures.insert(vehicle_id, Instant::now());
                }
            }
            guard.settled = true;
        }))
    }

    /// Swaps in a finished resolution, keeping the vehicle's fractional
    /// progress: `new_index = floor(new_len * old_index / old_len)`.
    /// Results for a route the vehicle no longer drives are dropped.
    pub fn apply_resolved(&self, vehicle: &mut Vehicle) -> bool {
        let Some((_, resolution)) = self.inbox.remove(&vehicle.id) else {
            return false;
        };

        let old_len = match vehicle.route.as_ref() {
            Some(current) if current.id == resolution.replaces && !current.is_empty() => current.len(),
            _ => {
                tracing::debug!(vehicle_id = %vehicle.id, "Discarding resolution for a replaced route");
                return false;
            }
        };

        let new_len = resolution.route.len();
        let new_index = (new_len * vehicle.route_index / old_len).min(new_len - 1);

        tracing::info!(
            vehicle_id = %vehicle.id,
            old_index = vehicle.route_index,
            old_len,
            new_index,
            new_len,
            "Switching to resolved route"
        );

        vehicle.position = resolution.route.waypoints[new_index];
        vehicle.route_index = new_index;
        vehicle.route = Some(resolution.route);
        true
    }

    /// Resolves a route right away and fails loudly. Used when a caller
    /// explicitly asks for a provider route.
    pub async fn request_route(&self, from: GeoPoint, to: GeoPoint) -> Result<Route, RoutingError> {
        let path = self.provider.route(from, to).await?;
        if path.waypoints.is_empty() {
            return Err(RoutingError::Malformed("route geometry is empty".to_string()));
        }
        Ok(path.into_route())
    }

    pub fn is_pending(&self, vehicle_id: VehicleId) -> bool {
        self.pending.contains(&vehicle_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn in_backoff(&self, vehicle_id: VehicleId) -> bool {
        self.failures
            .get(&vehicle_id)
            .map_or(false, |failed_at| failed_at.elapsed() < self.retry_after)
    }
}
