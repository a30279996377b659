use crate::rules::Prediction;
use dashmap::DashMap;
use shared::VehicleId;

/// Latest prediction set per vehicle. Each vehicle's set is swapped out
/// wholesale, never patched.
#[derive(Debug, Default)]
pub struct PredictionBoard {
    by_vehicle: DashMap<VehicleId, Vec<Prediction>>,
}

impl PredictionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, vehicle_id: VehicleId, predictions: Vec<Prediction>) {
        if predictions.is_empty() {
            self.by_vehicle.remove(&vehicle_id);
        } else {
            self.by_vehicle.insert(vehicle_id, predictions);
        }
    }

    pub fn for_vehicle(&self, vehicle_id: VehicleId) -> Vec<Prediction> {
        self.by_vehicle
            .get(&vehicle_id)
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }

    /// Fleet-wide list, soonest failure first.
    pub fn all(&self) -> Vec<Prediction> {
        let mut all: Vec<Prediction> = self
            .by_vehicle
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|p| p.predicted_failure_in_days);
        all
    }

    pub fn len(&self) -> usize {
        self.by_vehicle.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
