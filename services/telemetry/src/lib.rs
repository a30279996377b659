pub mod sampler;


pub use sampler::{gaussian, TelemetryError, TelemetrySampler};
