use crate::error::SimulationError;
use crate::fleet::Fleet;
use alerts_service::{DeriveOutcome, NotificationDeriver, NotificationStore, Timeline};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prediction_service::{PredictionBoard, PredictionEngine};
use rand::rngs::StdRng;
use routing_service::{RouteEngine, RouteProvider};
use shared::{Catalog, ChangeKind, EventPublisher, FleetConfig, Vehicle, VehicleId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use telemetry_service::TelemetrySampler;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub processed: usize,
    pub failed: usize,
    pub notifications: usize,
}

/// One tick's work: every vehicle goes through route advance, measurement,
/// classification and notification derivation, then is announced.
pub struct TickPipeline {
    fleet: Arc<Fleet>,
    routes: Arc<RouteEngine>,
    sampler: Arc<TelemetrySampler>,
    predictor: Arc<PredictionEngine>,
    board: Arc<PredictionBoard>,
    deriver: Arc<NotificationDeriver>,
    publisher: EventPublisher,
    ticks: AtomicU64,
    tick_lock: Mutex<()>,
}

impl TickPipeline {
    pub fn new(
        fleet: Arc<Fleet>,
        routes: Arc<RouteEngine>,
        sampler: Arc<TelemetrySampler>,
        predictor: Arc<PredictionEngine>,
        board: Arc<PredictionBoard>,
        deriver: Arc<NotificationDeriver>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            fleet,
            routes,
            sampler,
            predictor,
            board,
            deriver,
            publisher,
            ticks: AtomicU64::new(0),
            tick_lock: Mutex::new(()),
        }
    }

    /// Wires every engine from configuration. `provider` answers the
    /// background route resolutions and explicit route requests.
    pub fn from_config(
        cfg: &FleetConfig,
        catalog: Catalog,
        provider: Arc<dyn RouteProvider>,
    ) -> Self {
        let predictor = PredictionEngine::new(&catalog.sensors, &cfg.prediction);
        let sampler = TelemetrySampler::new(catalog.sensors.clone(), cfg.telemetry.history_len);
        let store = Arc::new(NotificationStore::new(
            cfg.alerts.notification_ttl(),
            cfg.gateway.push_capacity,
        ));
        let deriver = NotificationDeriver::new(
            store,
            Arc::new(Timeline::new()),
            cfg.alerts.max_prediction_notifications,
        );
        let fleet = Fleet::new(catalog, cfg.routing.clone(), cfg.simulation.rng_seed);

        Self::new(
            Arc::new(fleet),
            Arc::new(RouteEngine::new(provider, cfg.routing.retry_after())),
            Arc::new(sampler),
            Arc::new(predictor),
            Arc::new(PredictionBoard::new()),
            Arc::new(deriver),
            EventPublisher::new(cfg.gateway.push_capacity),
        )
    }

    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    pub fn routes(&self) -> &Arc<RouteEngine> {
        &self.routes
    }

    pub fn sampler(&self) -> &Arc<TelemetrySampler> {
        &self.sampler
    }

    pub fn board(&self) -> &Arc<PredictionBoard> {
        &self.board
    }

    pub fn deriver(&self) -> &Arc<NotificationDeriver> {
        &self.deriver
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Runs one full tick. Vehicles are processed one after another; an
    /// error or panic in one vehicle is logged and the rest still run.
    pub fn tick(&self) -> TickReport {
        let _running = self.tick_lock.lock();
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        self.deriver.begin_tick();

        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for id in self.fleet.ids() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                self.fleet
                    .with_vehicle_mut(id, |vehicle, rng| self.step(vehicle, rng, now))
            }));

            match outcome {
                Ok(Some(Ok(derived))) => {
                    report.processed += 1;
                    report.notifications += derived.warnings + derived.predictions;
                    self.publisher.publish(id, ChangeKind::Stepped);
                }
                Ok(Some(Err(e))) => {
                    report.failed += 1;
                    tracing::warn!(tick, vehicle_id = %id, error = %e, "Vehicle step failed");
                }
                // vanished between listing and stepping
                Ok(None) => {}
                Err(panic) => {
                    report.failed += 1;
                    tracing::warn!(
                        tick,
                        vehicle_id = %id,
                        panic = %panic_message(&*panic),
                        "Vehicle step panicked"
                    );
                }
            }
        }

        tracing::debug!(
            tick,
            processed = report.processed,
            failed = report.failed,
            notifications = report.notifications,
            "Tick completed"
        );
        report
    }

    fn step(
        &self,
        vehicle: &mut Vehicle,
        rng: &mut StdRng,
        now: DateTime<Utc>,
    ) -> Result<DeriveOutcome, SimulationError> {
        if let Some(route) = &vehicle.route {
            if vehicle.route_index >= route.len() {
                return Err(SimulationError::RouteIndexOutOfRange {
                    index: vehicle.route_index,
                    len: route.len(),
                });
            }
        }
        self.routes.advance(vehicle);
        self.sampler.measure(vehicle, rng, now)?;
        let predictions = self.predictor.classify(vehicle);
        let outcome = self.deriver.derive(vehicle, &predictions);
        self.board.replace(vehicle.id, predictions);
        Ok(outcome)
    }

    /// Measures one vehicle on request and refreshes its predictions, as a
    /// tick would, without moving it.
    pub fn measure(&self, id: VehicleId) -> Result<Vehicle, SimulationError> {
        self.fleet.measure_vehicle(&self.sampler, id)?;
        let vehicle = self
            .fleet
            .get(id)
            .ok_or(SimulationError::VehicleNotFound(id))?;
        self.board.replace(id, self.predictor.classify(&vehicle));
        self.publisher.publish(id, ChangeKind::Measured);
        Ok(vehicle)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
