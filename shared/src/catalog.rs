//! Reference data the simulation draws from: hubs to start at and drive
//! to, vehicle models to hand out, and the sensors every vehicle carries.

use crate::types::{GeoPoint, MetricKind, SensorDefinition, Thresholds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub name: String,
    pub position: GeoPoint,
}

impl Hub {
    pub fn new(name: &str, lat: f64, lng: f64) -> Self {
        Self {
            name: name.to_string(),
            position: GeoPoint::new(lat, lng),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleModel {
    pub name: String,
    pub manufacturer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub hubs: Vec<Hub>,
    pub models: Vec<VehicleModel>,
    pub sensors: Vec<SensorDefinition>,
}

impl Catalog {
    pub fn hub(&self, name: &str) -> Option<&Hub> {
        self.hubs.iter().find(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Hubs, models and sensors for a European delivery fleet.
    pub fn european_fleet() -> Self {
        Self {
            hubs: vec![
                Hub::new("Berlin", 52.5200, 13.4050),
                Hub::new("Hamburg", 53.5511, 9.9937),
                Hub::new("Munich", 48.1351, 11.5820),
                Hub::new("Cologne", 50.9375, 6.9603),
                Hub::new("Frankfurt", 50.1109, 8.6821),
                Hub::new("Leipzig", 51.3397, 12.3731),
                Hub::new("Stuttgart", 48.7758, 9.1829),
            ],
            models: vec![
                model("Sprinter", "Mercedes-Benz"),
                model("Crafter", "Volkswagen"),
                model("Transit", "Ford"),
                model("TGE", "MAN"),
            ],
            sensors: default_sensors(),
        }
    }
}

fn model(name: &str, manufacturer: &str) -> VehicleModel {
    VehicleModel {
        name: name.to_string(),
        manufacturer: manufacturer.to_string(),
    }
}

pub fn default_sensors() -> Vec<SensorDefinition> {
    vec![
        SensorDefinition {
            kind: MetricKind::EngineTemp,
            name: "Engine coolant temperature".to_string(),
            unit: "°C".to_string(),
            min: 70.0,
            max: 105.0,
            reference: Some(82.0),
            thresholds: Thresholds::high(90.0, 95.0),
        },
        SensorDefinition {
            kind: MetricKind::OilLevel,
            name: "Engine oil level".to_string(),
            unit: "%".to_string(),
            min: 0.0,
            max: 100.0,
            reference: Some(70.0),
            thresholds: Thresholds::low(50.0, 20.0),
        },
        SensorDefinition {
            kind: MetricKind::TyrePressure,
            name: "Tyre pressure".to_string(),
            unit: "bar".to_string(),
            min: 70.0,
            max: 160.0,
            reference: Some(120.0),
            thresholds: Thresholds::low(100.0, 80.0),
        },
        SensorDefinition {
            kind: MetricKind::BatteryHealth,
            name: "Battery SoC".to_string(),
            unit: "%".to_string(),
            min: 0.0,
            max: 100.0,
            reference: Some(80.0),
            thresholds: Thresholds::low(20.0, 10.0),
        },
    ]
}
