pub mod error;
pub mod router;
pub mod websocket;


pub use error::ApiError;
pub use router::{create_router, AppState};
