use shared::config::RoutingConfig;
use shared::{GeoPoint, Route};
use std::f64::consts::PI;

/// Builds a synthetic route from `origin` to `destination` that bows out
/// sideways like a road instead of running in a straight line.
///
/// The sideways offset follows half a sine wave along the trip, zero at
/// both ends and `curve_amplitude_deg` at the middle. Waypoints are spaced
/// roughly `waypoint_spacing_deg` apart, bounded by the configured
/// minimum and maximum count.
pub fn curved_route(origin: GeoPoint, destination: GeoPoint, cfg: &RoutingConfig) -> Route {
    let d_lat = destination.lat - origin.lat;
    let d_lng = destination.lng - origin.lng;
    let distance = origin.degree_distance(&destination);

    let min_segments = cfg.min_waypoints.saturating_sub(1).max(1);
    let max_segments = cfg.max_waypoints.saturating_sub(1).max(min_segments);
    let wanted = if cfg.waypoint_spacing_deg > 0.0 {
        (distance / cfg.waypoint_spacing_deg).ceil() as usize
    } else {
        min_segments
    };
    let segments = wanted.clamp(min_segments, max_segments);

    // unit vector perpendicular to the bearing
    let (perp_lat, perp_lng) = if distance > 0.0 {
        (-d_lng / distance, d_lat / distance)
    } else {
        (0.0, 0.0)
    };

    let waypoints = (0..=segments)
        .map(|i| {
            if i == segments {
                return destination;
            }
            let t = i as f64 / segments as f64;
            let bulge = cfg.curve_amplitude_deg * (PI * t).sin();
            GeoPoint::new(
                origin.lat + d_lat * t + perp_lat * bulge,
                origin.lng + d_lng * t + perp_lng * bulge,
            )
        })
        .collect();

    Route::synthetic(waypoints)
}
