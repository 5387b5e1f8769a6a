use crate::types::route::Point;

/// Maps a normalized playback distance onto the first point whose cumulative
/// segment distance reaches that share of the route total.
pub fn point_index_from_distance(distance: f64, points: &[Point], all_distance: f64) -> usize {
    if distance == 0.0 || distance.is_nan() || points.is_empty() {
        return 0;
    }
    if distance == 1.0 {
        return points.len() - 1;
    }

    let target = all_distance * distance;
    let mut completed = 0.0;
    for (idx, point) in points.iter().enumerate() {
        completed += point.segment_distance.unwrap_or(0.0);
        if completed >= target {
            return idx;
        }
    }
    0
}

/// Share of the route total covered up to and including `index`.
///
/// Not an exact inverse of [`point_index_from_distance`]: that one picks the
/// first index reaching a threshold, this one looks an index up directly.
pub fn distance_from_point_index(index: usize, points: &[Point], all_distance: f64) -> f64 {
    if index == 0 || points.is_empty() {
        return 0.0;
    }
    if index == points.len() - 1 {
        return 1.0;
    }
    if index >= points.len() || all_distance == 0.0 {
        return 0.0;
    }

    let completed: f64 = points[..=index]
        .iter()
        .map(|p| p.segment_distance.unwrap_or(0.0))
        .sum();
    let distance = completed / all_distance;
    if distance.is_finite() {
        distance
    } else {
        0.0
    }
}

/// Position at `fraction` of a polyline's geometric length.
pub fn coordinate_at(coords: &[(f64, f64)], fraction: f64) -> Option<(f64, f64)> {
    let first = *coords.first()?;
    if coords.len() == 1 || fraction.is_nan() || fraction <= 0.0 {
        return Some(first);
    }
    let last = coords[coords.len() - 1];
    if fraction >= 1.0 {
        return Some(last);
    }

    let segment_lengths: Vec<f64> = coords
        .windows(2)
        .map(|pair| distance_2d(pair[0], pair[1]))
        .collect();
    let total_length: f64 = segment_lengths.iter().sum();
    if total_length <= f64::EPSILON {
        return Some(first);
    }

    let target_length = total_length * fraction;
    let mut traveled = 0.0;
    for (idx, segment_length) in segment_lengths.iter().copied().enumerate() {
        if segment_length <= f64::EPSILON {
            continue;
        }
        let next_traveled = traveled + segment_length;
        if next_traveled < target_length {
            traveled = next_traveled;
            continue;
        }
        let local_t = ((target_length - traveled) / segment_length).clamp(0.0, 1.0);
        return Some(lerp_point(coords[idx], coords[idx + 1], local_t));
    }
    Some(last)
}

fn distance_2d(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    (dx * dx + dy * dy).sqrt()
}

fn lerp_point(a: (f64, f64), b: (f64, f64), t: f64) -> (f64, f64) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::route::Route;
    use proptest::prelude::*;

    fn route_from(samples: &[(f64, f64)]) -> Route {
        let mut route = Route {
            route_id: 7,
            from_port: "A".to_string(),
            to_port: "B".to_string(),
            leg_duration: 0,
            all_distance: 0.0,
            points: samples
                .iter()
                .map(|(timestamp, speed)| Point::new(0.0, 0.0, *timestamp, *speed))
                .collect(),
        };
        route.attach_distances();
        route
    }

    fn three_points() -> Route {
        route_from(&[(0.0, 0.0), (10.0, 2.0), (20.0, 3.0)])
    }

    #[test]
    fn endpoints_map_to_first_and_last_index() {
        let route = three_points();
        assert_eq!(point_index_from_distance(0.0, &route.points, route.all_distance), 0);
        assert_eq!(point_index_from_distance(1.0, &route.points, route.all_distance), 2);
        assert_eq!(distance_from_point_index(0, &route.points, route.all_distance), 0.0);
        assert_eq!(distance_from_point_index(2, &route.points, route.all_distance), 1.0);
    }

    #[test]
    fn half_way_picks_first_point_reaching_threshold() {
        // cumulative: 0, 20, 50; half of 50 is 25, first reached at index 2
        let route = three_points();
        assert_eq!(point_index_from_distance(0.5, &route.points, route.all_distance), 2);
        assert_eq!(point_index_from_distance(0.4, &route.points, route.all_distance), 1);
    }

    #[test]
    fn inner_index_maps_to_cumulative_share() {
        let route = three_points();
        let d = distance_from_point_index(1, &route.points, route.all_distance);
        assert!((d - 0.4).abs() < 1e-12);
    }

    #[test]
    fn missing_distances_degrade_to_zero() {
        let mut route = three_points();
        route.all_distance = 0.0;
        assert_eq!(distance_from_point_index(1, &route.points, 0.0), 0.0);

        let raw: Vec<Point> = route
            .points
            .iter()
            .map(|p| Point::new(p.lon, p.lat, p.timestamp, p.speed))
            .collect();
        // with nothing accumulated the zero target is met at the first point
        assert_eq!(point_index_from_distance(0.3, &raw, 0.0), 0);
    }

    #[test]
    fn nan_distance_is_treated_as_start() {
        let route = three_points();
        assert_eq!(point_index_from_distance(f64::NAN, &route.points, route.all_distance), 0);
    }

    #[test]
    fn out_of_range_index_is_zero() {
        let route = three_points();
        assert_eq!(distance_from_point_index(9, &route.points, route.all_distance), 0.0);
    }

    #[test]
    fn asymmetric_round_trip_is_preserved() {
        // a stationary middle point shares its cumulative value with the start
        let route = route_from(&[(0.0, 0.0), (10.0, 0.0), (20.0, 5.0)]);
        let d = distance_from_point_index(1, &route.points, route.all_distance);
        assert_eq!(d, 0.0);
        assert_eq!(point_index_from_distance(d, &route.points, route.all_distance), 0);
    }

    #[test]
    fn coordinate_at_interpolates_by_length() {
        let coords = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)];
        assert_eq!(coordinate_at(&coords, 0.0), Some((0.0, 0.0)));
        assert_eq!(coordinate_at(&coords, 0.25), Some((5.0, 0.0)));
        assert_eq!(coordinate_at(&coords, 0.75), Some((10.0, 5.0)));
        assert_eq!(coordinate_at(&coords, 1.0), Some((10.0, 10.0)));
        assert_eq!(coordinate_at(&[], 0.5), None);
    }

    fn arb_route() -> impl Strategy<Value = Route> {
        prop::collection::vec((0.1f64..100.0, 0.1f64..20.0), 1..40).prop_map(|steps| {
            let mut timestamp = 0.0;
            let samples: Vec<(f64, f64)> = steps
                .into_iter()
                .map(|(dt, speed)| {
                    timestamp += dt;
                    (timestamp, speed)
                })
                .collect();
            route_from(&samples)
        })
    }

    proptest! {
        #[test]
        fn prop_index_is_always_valid(route in arb_route(), d in 0.0f64..=1.0) {
            let idx = point_index_from_distance(d, &route.points, route.all_distance);
            prop_assert!(idx < route.points.len());
        }

        #[test]
        fn prop_index_is_monotonic(route in arb_route(), a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (d1, d2) = if a <= b { (a, b) } else { (b, a) };
            let i1 = point_index_from_distance(d1, &route.points, route.all_distance);
            let i2 = point_index_from_distance(d2, &route.points, route.all_distance);
            prop_assert!(i1 <= i2);
        }

        #[test]
        fn prop_endpoints(route in arb_route()) {
            let last = route.points.len() - 1;
            prop_assert_eq!(point_index_from_distance(0.0, &route.points, route.all_distance), 0);
            prop_assert_eq!(point_index_from_distance(1.0, &route.points, route.all_distance), last);
            prop_assert_eq!(distance_from_point_index(0, &route.points, route.all_distance), 0.0);
            if last > 0 {
                prop_assert_eq!(distance_from_point_index(last, &route.points, route.all_distance), 1.0);
            }
        }
    }
}
