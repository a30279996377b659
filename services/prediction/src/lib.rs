pub mod board;
pub mod engine;
pub mod rules;


pub use board::PredictionBoard;
pub use engine::PredictionEngine;
pub use rules::{MetricRule, Prediction, Priority, RuleParams};
