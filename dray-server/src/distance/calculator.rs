//! Distance calculation over a move's ordered stops

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;

use crate::db::models::{DistanceOverride, Location, Stop};

/// Earth radius in statute miles.
const EARTH_RADIUS_MI: f64 = 3958.8;

/// Persisted distances round to hundredths of a mile.
const DISTANCE_DP: u32 = 2;

/// Where a move's distance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceSource {
    Override,
    Calculated,
}

/// A resolved move distance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceResult {
    pub miles: Decimal,
    pub source: DistanceSource,
}

/// Outcome of a distance calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistanceOutcome {
    Computed(DistanceResult),
    /// Fewer than two stops; callers treat this as a zero-distance no-op.
    InsufficientStops,
}

/// Great-circle distance between two (lat, lon) points in miles.
pub fn haversine_miles(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MI * h.sqrt().asin()
}

/// Resolve a move's distance from its ordered stops.
///
/// `stops` must already be ordered by sequence. `override_entry`, when
/// present, is the tenant's exact match for the (first, last) location pair
/// and wins outright. Otherwise consecutive segments with coordinates on
/// both endpoints are summed; segments missing coordinates are skipped with
/// a warning.
pub fn calculate(
    stops: &[Stop],
    locations: &HashMap<String, Location>,
    override_entry: Option<&DistanceOverride>,
) -> DistanceOutcome {
    if stops.len() < 2 {
        return DistanceOutcome::InsufficientStops;
    }

    if let Some(ov) = override_entry {
        return DistanceOutcome::Computed(DistanceResult {
            miles: ov.distance,
            source: DistanceSource::Override,
        });
    }

    let mut total = 0.0_f64;
    for pair in stops.windows(2) {
        let coords = (
            locations
                .get(&pair[0].location_id)
                .and_then(Location::coordinates),
            locations
                .get(&pair[1].location_id)
                .and_then(Location::coordinates),
        );
        match coords {
            (Some(from), Some(to)) => total += haversine_miles(from, to),
            _ => {
                tracing::warn!(
                    from_location = %pair[0].location_id,
                    to_location = %pair[1].location_id,
                    "segment endpoints missing coordinates; skipping segment"
                );
            }
        }
    }

    DistanceOutcome::Computed(DistanceResult {
        miles: Decimal::from_f64(total)
            .unwrap_or_default()
            .round_dp(DISTANCE_DP),
        source: DistanceSource::Calculated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::ToPrimitive;

    fn location(id: &str, coords: Option<(f64, f64)>) -> Location {
        Location {
            id: id.to_string(),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            ..Location::default()
        }
    }

    fn stop_at(location_id: &str, seq: i32) -> Stop {
        Stop {
            location_id: location_id.to_string(),
            sequence: seq,
            ..Stop::default()
        }
    }

    fn location_map(locations: Vec<Location>) -> HashMap<String, Location> {
        locations.into_iter().map(|l| (l.id.clone(), l)).collect()
    }

    const NYC: (f64, f64) = (40.7128, -74.0060);
    const LA: (f64, f64) = (34.0522, -118.2437);
    const CHI: (f64, f64) = (41.8781, -87.6298);

    #[test]
    fn haversine_nyc_to_la() {
        let miles = haversine_miles(NYC, LA);
        assert!((miles - 2445.0).abs() < 10.0, "got {miles}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert!(haversine_miles(NYC, NYC) < 1e-9);
    }

    #[test]
    fn fewer_than_two_stops_is_insufficient() {
        let locs = location_map(vec![location("loc_a", Some(NYC))]);
        assert_eq!(
            calculate(&[stop_at("loc_a", 0)], &locs, None),
            DistanceOutcome::InsufficientStops
        );
    }

    #[test]
    fn override_short_circuits() {
        let locs = location_map(vec![location("loc_a", Some(NYC)), location("loc_b", Some(LA))]);
        let ov = DistanceOverride {
            origin_location_id: "loc_a".into(),
            destination_location_id: "loc_b".into(),
            distance: Decimal::from(2800),
            ..DistanceOverride::default()
        };
        let out = calculate(
            &[stop_at("loc_a", 0), stop_at("loc_b", 1)],
            &locs,
            Some(&ov),
        );
        assert_eq!(
            out,
            DistanceOutcome::Computed(DistanceResult {
                miles: Decimal::from(2800),
                source: DistanceSource::Override,
            })
        );
    }

    #[test]
    fn segments_sum_across_intermediate_stops() {
        let locs = location_map(vec![
            location("loc_a", Some(NYC)),
            location("loc_b", Some(CHI)),
            location("loc_c", Some(LA)),
        ]);
        let stops = [stop_at("loc_a", 0), stop_at("loc_b", 1), stop_at("loc_c", 2)];
        let DistanceOutcome::Computed(result) = calculate(&stops, &locs, None) else {
            panic!("expected computed distance");
        };
        assert_eq!(result.source, DistanceSource::Calculated);
        // NYC→CHI (~712) + CHI→LA (~1745) is longer than the direct leg
        let direct = haversine_miles(NYC, LA);
        let via = result.miles.to_f64().unwrap();
        assert!(via > direct, "via {via} direct {direct}");
        assert!((via - 2457.0).abs() < 25.0, "got {via}");
    }

    #[test]
    fn missing_coordinates_skip_segment() {
        let locs = location_map(vec![
            location("loc_a", Some(NYC)),
            location("loc_b", None),
            location("loc_c", Some(LA)),
        ]);
        let stops = [stop_at("loc_a", 0), stop_at("loc_b", 1), stop_at("loc_c", 2)];
        let DistanceOutcome::Computed(result) = calculate(&stops, &locs, None) else {
            panic!("expected computed distance");
        };
        // both segments touch loc_b → everything skipped, zero total
        assert_eq!(result.miles, Decimal::ZERO);
        assert_eq!(result.source, DistanceSource::Calculated);
    }
}
