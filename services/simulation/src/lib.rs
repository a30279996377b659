pub mod clock;
pub mod error;
pub mod fleet;
pub mod pipeline;


pub use clock::SimulationClock;
pub use error::SimulationError;
pub use fleet::{Fleet, RegisterVehicle};
pub use pipeline::{TickPipeline, TickReport};
