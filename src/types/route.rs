use serde::{Deserialize, Serialize};

/// A single sample along a route.
///
/// The wire form is the numeric tuple `[lon, lat, timestamp, speed]`, with the
/// derived segment distance appended as a fifth entry once computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
    pub timestamp: f64,
    pub speed: f64,
    pub segment_distance: Option<f64>,
}

impl Point {
    pub fn new(lon: f64, lat: f64, timestamp: f64, speed: f64) -> Self {
        Self {
            lon,
            lat,
            timestamp,
            speed,
            segment_distance: None,
        }
    }

    /// Builds a point from a raw tuple. Needs at least the four leading fields.
    pub fn from_tuple(values: &[f64]) -> Option<Self> {
        if values.len() < 4 {
            return None;
        }
        Some(Self {
            lon: values[0],
            lat: values[1],
            timestamp: values[2],
            speed: values[3],
            segment_distance: values.get(4).copied(),
        })
    }
}

impl From<Vec<f64>> for Point {
    fn from(values: Vec<f64>) -> Self {
        Point::from_tuple(&values).unwrap_or_else(|| {
            let field = |idx: usize| values.get(idx).copied().unwrap_or(0.0);
            Point::new(field(0), field(1), field(2), field(3))
        })
    }
}

impl From<Point> for Vec<f64> {
    fn from(point: Point) -> Self {
        let mut values = vec![point.lon, point.lat, point.timestamp, point.speed];
        if let Some(distance) = point.segment_distance {
            values.push(distance);
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: i64,
    pub from_port: String,
    pub to_port: String,
    pub leg_duration: i64,
    pub all_distance: f64,
    pub points: Vec<Point>,
}

impl Route {
    pub fn distances_ready(&self) -> bool {
        !self.points.is_empty() && self.points.iter().all(|p| p.segment_distance.is_some())
    }

    /// Returns a copy with per-point segment distances and the route total filled in.
    pub fn with_distances(&self) -> Route {
        let mut route = self.clone();
        route.attach_distances();
        route
    }

    /// Segment distance is the time delta to the previous point times the
    /// point's own speed; the first point always contributes zero.
    pub fn attach_distances(&mut self) {
        let mut total = 0.0;
        let mut previous_timestamp: Option<f64> = None;
        for point in &mut self.points {
            let segment = previous_timestamp
                .map(|prev| (point.timestamp - prev) * point.speed)
                .unwrap_or(0.0);
            point.segment_distance = Some(segment);
            previous_timestamp = Some(point.timestamp);
            total += segment;
        }
        self.all_distance = total;
    }

    pub fn max_speed(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.speed)
            .fold(0.0, f64::max)
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            route_id: self.route_id,
            from_port: self.from_port.clone(),
            to_port: self.to_port.clone(),
            leg_duration: self.leg_duration,
            all_distance: self.all_distance,
            point_count: self.points.len(),
            distances_ready: self.distances_ready(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    pub route_id: i64,
    pub from_port: String,
    pub to_port: String,
    pub leg_duration: i64,
    pub all_distance: f64,
    pub point_count: usize,
    pub distances_ready: bool,
}
