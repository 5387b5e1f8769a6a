pub mod broadcast;
pub mod ticker;

use crate::pipeline::progress::{distance_from_point_index, point_index_from_distance};
use crate::types::route::Route;

pub use broadcast::{IndexBroadcaster, PlaybackSnapshot, PlaybackState};
pub use ticker::Ticker;

pub const DEFAULT_SPEED: f64 = 300.0;

/// Milliseconds one full traversal takes at `speed`.
pub fn traversal_duration_ms(speed: f64) -> f64 {
    1_000_000.0 / speed
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Idle,
    Advanced { distance: f64, point_index: usize },
    Finished,
}

/// Marker animation along the active route.
///
/// `distance` is the marker's fraction of the drawn line; `point_index` is
/// the chart point derived from it through the progress model.
#[derive(Debug, Clone)]
pub struct Playback {
    animating: bool,
    distance: f64,
    last_time_ms: f64,
    point_index: usize,
    speed: f64,
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

impl Playback {
    pub fn new(speed: f64) -> Self {
        Self {
            animating: false,
            distance: 0.0,
            last_time_ms: 0.0,
            point_index: 0,
            speed,
        }
    }

    pub fn animating(&self) -> bool {
        self.animating
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn point_index(&self) -> usize {
        self.point_index
    }

    /// Starting keeps the current position; stopping rewinds to the start.
    pub fn toggle(&mut self, now_ms: f64) -> bool {
        self.animating = !self.animating;
        if self.animating {
            self.last_time_ms = now_ms;
        } else {
            self.rewind();
        }
        self.animating
    }

    pub fn stop(&mut self) {
        self.animating = false;
        self.rewind();
    }

    pub fn tick(&mut self, route: &Route, now_ms: f64) -> TickOutcome {
        if !self.animating {
            return TickOutcome::Idle;
        }

        let elapsed = (now_ms - self.last_time_ms).max(0.0);
        self.distance = (self.distance + self.speed * elapsed / 1_000_000.0) % 2.0;
        self.last_time_ms = now_ms;

        if self.distance >= 1.0 {
            self.toggle(now_ms);
            return TickOutcome::Finished;
        }

        self.point_index = point_index_from_distance(self.distance, &route.points, route.all_distance);
        TickOutcome::Advanced {
            distance: self.distance,
            point_index: self.point_index,
        }
    }

    /// Jumps to a chart point. Out-of-range indices clamp to the last point.
    pub fn seek_index(&mut self, route: &Route, index: usize) -> usize {
        let index = index.min(route.points.len().saturating_sub(1));
        self.point_index = index;
        self.distance = distance_from_point_index(index, &route.points, route.all_distance);
        index
    }

    pub fn seek_distance(&mut self, route: &Route, distance: f64) -> usize {
        let distance = if distance.is_finite() {
            distance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.distance = distance;
        self.point_index = point_index_from_distance(distance, &route.points, route.all_distance);
        self.point_index
    }

    fn rewind(&mut self) {
        self.distance = 0.0;
        self.point_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::route::Point;

    fn route() -> Route {
        Route {
            route_id: 1,
            from_port: "A".to_string(),
            to_port: "B".to_string(),
            leg_duration: 20,
            all_distance: 0.0,
            points: vec![
                Point::new(0.0, 0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 10.0, 2.0),
                Point::new(2.0, 0.0, 20.0, 3.0),
            ],
        }
        .with_distances()
    }

    #[test]
    fn idle_until_started() {
        let mut playback = Playback::default();
        assert_eq!(playback.tick(&route(), 100.0), TickOutcome::Idle);
        assert_eq!(playback.distance(), 0.0);
    }

    #[test]
    fn advances_with_elapsed_time() {
        let route = route();
        let mut playback = Playback::new(300.0);
        assert!(playback.toggle(0.0));
        // 300 * 1000ms / 1e6 = 0.3
        match playback.tick(&route, 1000.0) {
            TickOutcome::Advanced {
                distance,
                point_index,
            } => {
                assert!((distance - 0.3).abs() < 1e-12);
                // 30% of 50 = 15, first reached at index 1 (cumulative 20)
                assert_eq!(point_index, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn finishing_stops_and_rewinds() {
        let route = route();
        let mut playback = Playback::new(300.0);
        playback.toggle(0.0);
        playback.tick(&route, 3000.0);
        assert_eq!(playback.tick(&route, 3400.0), TickOutcome::Finished);
        assert!(!playback.animating());
        assert_eq!(playback.distance(), 0.0);
        assert_eq!(playback.point_index(), 0);
    }

    #[test]
    fn start_resumes_from_seek_position() {
        let route = route();
        let mut playback = Playback::new(300.0);
        playback.seek_index(&route, 1);
        assert!((playback.distance() - 0.4).abs() < 1e-12);
        playback.toggle(500.0);
        playback.tick(&route, 1500.0);
        assert!((playback.distance() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn toggling_off_rewinds() {
        let route = route();
        let mut playback = Playback::new(300.0);
        playback.toggle(0.0);
        playback.tick(&route, 1000.0);
        assert!(!playback.toggle(1200.0));
        assert_eq!(playback.distance(), 0.0);
    }

    #[test]
    fn seek_clamps_inputs() {
        let route = route();
        let mut playback = Playback::default();
        assert_eq!(playback.seek_index(&route, 42), 2);
        assert_eq!(playback.distance(), 1.0);
        assert_eq!(playback.seek_distance(&route, -3.0), 0);
        assert_eq!(playback.seek_distance(&route, f64::NAN), 0);
        assert_eq!(playback.seek_distance(&route, 2.0), 2);
    }
}
