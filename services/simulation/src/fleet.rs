use crate::error::SimulationError;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use routing_service::{curved_route, RouteEngine};
use shared::config::RoutingConfig;
use shared::{Catalog, GeoPoint, Hub, Route, TelemetryReading, Vehicle, VehicleDetails, VehicleId};
use telemetry_service::TelemetrySampler;

const DEFAULT_NAME: &str = "Unnamed Vehicle";
const SERVICE_INTERVAL_DAYS: i64 = 180;

#[derive(Debug, Clone, Default)]
pub struct RegisterVehicle {
    pub name: Option<String>,
    pub position: Option<GeoPoint>,
}

/// The authoritative vehicle collection.
///
/// Vehicles are only ever added. Lock order is vehicles before rng; the
/// rng lock is never held while taking the vehicle lock.
pub struct Fleet {
    vehicles: RwLock<Vec<Vehicle>>,
    catalog: Catalog,
    routing: RoutingConfig,
    rng: Mutex<StdRng>,
}

impl Fleet {
    pub fn new(catalog: Catalog, routing: RoutingConfig, rng_seed: Option<u64>) -> Self {
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            vehicles: RwLock::new(Vec::new()),
            catalog,
            routing,
            rng: Mutex::new(rng),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn register_vehicle(&self, request: RegisterVehicle) -> Result<Vehicle, SimulationError> {
        if self.catalog.hubs.len() < 2 {
            return Err(SimulationError::EmptyCatalog("hubs"));
        }
        if self.catalog.models.is_empty() {
            return Err(SimulationError::EmptyCatalog("vehicle models"));
        }
        if let Some(p) = request.position {
            validate_position(p)?;
        }

        let vehicle = {
            let mut rng = self.rng.lock();
            let position = match request.position {
                Some(p) => p,
                None => {
                    let hub = self
                        .catalog
                        .hubs
                        .choose(&mut *rng)
                        .ok_or(SimulationError::EmptyCatalog("hubs"))?;
                    let j = self.routing.placement_jitter_deg.abs();
                    hub.position
                        .offset(rng.gen_range(-j..=j), rng.gen_range(-j..=j))
                }
            };

            let name = request
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string());
            let mut vehicle = Vehicle::new(name, position);
            vehicle.details = Some(self.random_details(&mut rng)?);
            vehicle
        };

        tracing::info!(
            vehicle_id = %vehicle.id,
            name = %vehicle.name,
            lat = vehicle.position.lat,
            lng = vehicle.position.lng,
            "Vehicle registered"
        );
        self.vehicles.write().push(vehicle.clone());
        Ok(vehicle)
    }

    fn random_details(&self, rng: &mut StdRng) -> Result<VehicleDetails, SimulationError> {
        let model = self
            .catalog
            .models
            .choose(rng)
            .ok_or(SimulationError::EmptyCatalog("vehicle models"))?;
        let last_service = Utc::now() - ChronoDuration::days(rng.gen_range(30..180));
        Ok(VehicleDetails {
            model: format!("{} {}", model.manufacturer, model.name),
            year: rng.gen_range(2015..2023),
            mileage_km: rng.gen_range(50_000..200_000),
            last_service,
            next_service: last_service + ChronoDuration::days(SERVICE_INTERVAL_DAYS),
        })
    }

    /// Looks up `name` among the hubs, or picks a random hub far enough
    /// from `from` to make a trip.
    pub fn destination(&self, from: GeoPoint, name: Option<&str>) -> Result<Hub, SimulationError> {
        if let Some(name) = name {
            return self
                .catalog
                .hub(name)
                .cloned()
                .ok_or_else(|| SimulationError::UnknownHub(name.to_string()));
        }

        let candidates: Vec<&Hub> = self
            .catalog
            .hubs
            .iter()
            .filter(|h| h.position.degree_distance(&from) >= self.routing.min_trip_deg)
            .collect();
        let mut rng = self.rng.lock();
        candidates
            .choose(&mut *rng)
            .map(|h| (*h).clone())
            .ok_or(SimulationError::EmptyCatalog("hubs far enough to drive to"))
    }

    /// Puts `route` on the vehicle, starting it at the route's origin.
    pub fn assign_route(&self, id: VehicleId, route: Route) -> Result<Vehicle, SimulationError> {
        self.with_vehicle_mut(id, |vehicle, _| {
            vehicle.assign_route(route);
            vehicle.clone()
        })
        .ok_or(SimulationError::VehicleNotFound(id))
    }

    /// Gives the vehicle a locally generated route. The route engine swaps
    /// it for a provider route in the background once the vehicle moves.
    pub fn assign_synthetic_route(
        &self,
        id: VehicleId,
        destination: Option<&str>,
    ) -> Result<Vehicle, SimulationError> {
        let from = self.position(id)?;
        let to = self.destination(from, destination)?;
        let route = curved_route(from, to.position, &self.routing);
        tracing::debug!(vehicle_id = %id, destination = %to.name, waypoints = route.len(), "Synthetic route assigned");
        self.assign_route(id, route)
    }

    /// Asks the routing provider for a route and assigns it. Provider
    /// errors fail the call; nothing falls back to a synthetic route here.
    pub async fn create_route(
        &self,
        engine: &RouteEngine,
        id: VehicleId,
        destination: Option<&str>,
    ) -> Result<Vehicle, SimulationError> {
        let from = self.position(id)?;
        let to = self.destination(from, destination)?;

        let route = match engine.request_route(from, to.position).await {
            Ok(route) => route,
            Err(e) => {
                tracing::error!(vehicle_id = %id, destination = %to.name, error = %e, "Route creation failed");
                return Err(e.into());
            }
        };

        tracing::info!(vehicle_id = %id, destination = %to.name, waypoints = route.len(), "Route created");
        self.assign_route(id, route)
    }

    /// Samples every sensor of one vehicle outside the tick.
    pub fn measure_vehicle(
        &self,
        sampler: &TelemetrySampler,
        id: VehicleId,
    ) -> Result<Vec<TelemetryReading>, SimulationError> {
        self.with_vehicle_mut(id, |vehicle, rng| sampler.measure(vehicle, rng, Utc::now()))
            .ok_or(SimulationError::VehicleNotFound(id))?
            .map_err(SimulationError::from)
    }

    /// Registers `count` vehicles at random hubs, each with a synthetic
    /// route to another hub.
    pub fn seed(&self, count: usize) -> Result<Vec<Vehicle>, SimulationError> {
        let mut seeded = Vec::with_capacity(count);
        for i in 0..count {
            let vehicle = self.register_vehicle(RegisterVehicle {
                name: Some(format!("Fleet Vehicle {}", i + 1)),
                position: None,
            })?;
            seeded.push(self.assign_synthetic_route(vehicle.id, None)?);
        }
        tracing::info!(count, "Fleet seeded");
        Ok(seeded)
    }

    pub fn get(&self, id: VehicleId) -> Option<Vehicle> {
        self.vehicles.read().iter().find(|v| v.id == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Vehicle> {
        self.vehicles.read().clone()
    }

    pub fn ids(&self) -> Vec<VehicleId> {
        self.vehicles.read().iter().map(|v| v.id).collect()
    }

    pub fn len(&self) -> usize {
        self.vehicles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, id: VehicleId) -> Result<GeoPoint, SimulationError> {
        self.vehicles
            .read()
            .iter()
            .find(|v| v.id == id)
            .map(|v| v.position)
            .ok_or(SimulationError::VehicleNotFound(id))
    }

    /// Runs `f` on one vehicle under the write lock, with the fleet's rng.
    pub fn with_vehicle_mut<R>(
        &self,
        id: VehicleId,
        f: impl FnOnce(&mut Vehicle, &mut StdRng) -> R,
    ) -> Option<R> {
        let mut vehicles = self.vehicles.write();
        let vehicle = vehicles.iter_mut().find(|v| v.id == id)?;
        let mut rng = self.rng.lock();
        Some(f(vehicle, &mut rng))
    }
}

fn validate_position(p: GeoPoint) -> Result<(), SimulationError> {
    if !p.lat.is_finite() || !p.lng.is_finite() || p.lat.abs() > 90.0 || p.lng.abs() > 180.0 {
        return Err(SimulationError::InvalidCoordinates(format!(
            "({}, {}) is not a position on earth",
            p.lat, p.lng
        )));
    }
    Ok(())
}
