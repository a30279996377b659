pub mod engine;
pub mod provider;
pub mod synthetic;

#[cfg(test)]
mod tests;

pub use engine::RouteEngine;
pub use provider::{OsrmClient, ResolvedPath, RouteProvider, RoutingError};
pub use synthetic::curved_route;
