use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{AppError, RenderError};
use crate::pipeline::render;
use crate::playback::{
    IndexBroadcaster, Playback, PlaybackSnapshot, PlaybackState, TickOutcome, Ticker,
};
use crate::state::RouteCatalog;
use crate::types::route::Route;
use crate::types::viz::{ChartOptions, Coordinate, MapOptions};

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum SeekTarget {
    PointIndex { point_index: usize },
    Distance { distance: f64 },
}

/// Per-viewer state: which route is shown and where its marker is.
pub struct Session {
    active_route_id: Option<i64>,
    playback: Playback,
    broadcaster: IndexBroadcaster,
    ticker: Option<Ticker>,
    center: Coordinate,
    epoch: Instant,
    touched_at: Instant,
}

impl Session {
    fn new(config: &Config) -> Self {
        let now = Instant::now();
        Self {
            active_route_id: None,
            playback: Playback::new(config.animation_speed),
            broadcaster: IndexBroadcaster::new(config.broadcast_interval, config.settle_delay),
            ticker: None,
            center: Coordinate::FALLBACK_CENTER,
            epoch: now,
            touched_at: now,
        }
    }

    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn state(&self) -> PlaybackState {
        PlaybackState {
            route_id: self.active_route_id,
            point_index: self.playback.point_index(),
            distance: self.playback.distance(),
            animating: self.playback.animating(),
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    fn publish_now(&mut self) -> PlaybackSnapshot {
        let state = self.state();
        self.broadcaster.publish_now(state)
    }
}

#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Session>>,
    catalog: RouteCatalog,
    config: Arc<Config>,
}

impl SessionHandle {
    pub fn new(catalog: RouteCatalog, config: Arc<Config>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Session::new(&config))),
            catalog,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn touch(&self) {
        self.lock().touched_at = Instant::now();
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.lock().touched_at.elapsed() >= ttl
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.lock().broadcaster.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.lock().broadcaster.subscribe()
    }

    pub fn center(&self) -> Coordinate {
        self.lock().center
    }

    pub fn active_route(&self) -> Option<Arc<Route>> {
        let route_id = self.lock().active_route_id?;
        self.catalog.get(route_id)
    }

    /// Switches the displayed route. Any running animation is stopped and the
    /// previous playback state discarded before the new route takes over.
    pub fn select_route(&self, route_id: Option<i64>) -> Result<PlaybackSnapshot, AppError> {
        if let Some(id) = route_id {
            if self.catalog.get(id).is_none() {
                return Err(AppError::RouteNotFound(id));
            }
        }

        let mut session = self.lock();
        session.stop_ticker();
        session.playback = Playback::new(self.config.animation_speed);
        session.active_route_id = route_id;
        tracing::debug!("Active route set to {:?}", route_id);
        Ok(session.publish_now())
    }

    pub fn toggle_animation(&self) -> Result<PlaybackSnapshot, AppError> {
        let mut session = self.lock();
        if session.active_route_id.is_none() {
            return Err(AppError::BadRequest("No active route".to_string()));
        }

        let now = session.now_ms();
        session.stop_ticker();
        if session.playback.toggle(now) {
            session.ticker = Some(self.spawn_ticker());
        }
        Ok(session.publish_now())
    }

    pub fn seek(&self, target: SeekTarget) -> Result<PlaybackSnapshot, AppError> {
        let route = self
            .active_route()
            .ok_or_else(|| AppError::BadRequest("No active route".to_string()))?;

        let mut session = self.lock();
        if session.active_route_id != Some(route.route_id) {
            return Err(AppError::BadRequest("Active route changed".to_string()));
        }
        match target {
            SeekTarget::PointIndex { point_index } => {
                session.playback.seek_index(&route, point_index);
            }
            SeekTarget::Distance { distance } => {
                session.playback.seek_distance(&route, distance);
            }
        }
        Ok(session.publish_now())
    }

    /// Chart click: hit-tests the horizontal position and seeks to the point.
    pub fn chart_click(
        &self,
        x: f64,
        options: &ChartOptions,
    ) -> Result<Option<PlaybackSnapshot>, AppError> {
        let route = self
            .active_route()
            .ok_or_else(|| AppError::BadRequest("No active route".to_string()))?;
        match render::chart_index_at(x, route.points.len(), options) {
            Some(point_index) => self.seek(SeekTarget::PointIndex { point_index }).map(Some),
            None => Ok(None),
        }
    }

    /// Recenters the empty map on a reported location. Ignored while a route
    /// is shown or when the position is unusable.
    pub fn report_location(&self, location: Coordinate) -> Coordinate {
        let mut session = self.lock();
        if session.active_route_id.is_none() && location.is_valid() {
            session.center = location;
        }
        session.center
    }

    pub fn render_map(&self, options: &MapOptions) -> Result<String, RenderError> {
        let distance = self.lock().playback.distance();
        match self.active_route() {
            Some(route) => render::render_map_svg(&route, options, Some(distance)),
            None => Ok(render::render_empty_map_svg(options, self.center())),
        }
    }

    pub fn render_chart(&self, options: &ChartOptions) -> Result<Option<String>, RenderError> {
        let Some(route) = self.active_route() else {
            return Ok(None);
        };
        let point_index = self.lock().playback.point_index();
        render::render_chart_svg(&route, options, point_index).map(Some)
    }

    pub fn shutdown(&self) {
        let mut session = self.lock();
        session.stop_ticker();
        session.playback.stop();
    }

    fn spawn_ticker(&self) -> Ticker {
        let inner = Arc::downgrade(&self.inner);
        let catalog = self.catalog.clone();
        Ticker::spawn(self.config.frame_interval, move || advance(&inner, &catalog))
    }
}

/// One animation frame. Returns false once the ticker should end.
fn advance(inner: &Weak<Mutex<Session>>, catalog: &RouteCatalog) -> bool {
    let Some(inner) = inner.upgrade() else {
        return false;
    };
    let mut session = inner.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(route) = session.active_route_id.and_then(|id| catalog.get(id)) else {
        session.playback.stop();
        session.publish_now();
        return false;
    };

    let now = session.now_ms();
    match session.playback.tick(&route, now) {
        TickOutcome::Idle => false,
        TickOutcome::Advanced { .. } => {
            let state = session.state();
            session.broadcaster.offer(state);
            true
        }
        TickOutcome::Finished => {
            tracing::debug!("Playback of route {} finished", route.route_id);
            // dropping our own handle is fine: the loop exits before yielding
            session.ticker = None;
            session.publish_now();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::route::Point;

    fn catalog() -> RouteCatalog {
        let catalog = RouteCatalog::default();
        let route = Route {
            route_id: 11,
            from_port: "Santos".to_string(),
            to_port: "Itajai".to_string(),
            leg_duration: 20,
            all_distance: 0.0,
            points: vec![
                Point::new(-46.3, -23.9, 0.0, 0.0),
                Point::new(-47.0, -25.0, 10.0, 2.0),
                Point::new(-48.6, -26.9, 20.0, 3.0),
            ],
        };
        catalog.replace(vec![route.clone(), Route { route_id: 12, ..route }]);
        catalog.enrich();
        catalog
    }

    fn handle() -> SessionHandle {
        SessionHandle::new(catalog(), Arc::new(Config::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn animation_runs_to_completion_and_rewinds() {
        let session = handle();
        session.select_route(Some(11)).unwrap();
        let started = session.toggle_animation().unwrap();
        assert!(started.state.animating);

        tokio::time::sleep(Duration::from_millis(4000)).await;
        let done = session.snapshot();
        assert!(!done.state.animating);
        assert_eq!(done.state.point_index, 0);
        assert_eq!(done.state.distance, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_a_route_stops_running_animation() {
        let session = handle();
        session.select_route(Some(11)).unwrap();
        session.toggle_animation().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(session.lock().playback.distance() > 0.0);

        let snapshot = session.select_route(Some(12)).unwrap();
        assert_eq!(snapshot.state.route_id, Some(12));
        assert!(!snapshot.state.animating);
        assert!(session.lock().ticker.is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(session.lock().playback.distance(), 0.0);
    }

    #[tokio::test]
    async fn unknown_route_is_rejected() {
        let session = handle();
        assert!(matches!(
            session.select_route(Some(99)),
            Err(AppError::RouteNotFound(99))
        ));
    }

    #[tokio::test]
    async fn seek_requires_active_route() {
        let session = handle();
        assert!(session
            .seek(SeekTarget::PointIndex { point_index: 1 })
            .is_err());

        session.select_route(Some(11)).unwrap();
        let snapshot = session
            .seek(SeekTarget::PointIndex { point_index: 1 })
            .unwrap();
        assert_eq!(snapshot.state.point_index, 1);
        assert!((snapshot.state.distance - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn location_only_moves_empty_map() {
        let session = handle();
        let rotterdam = Coordinate {
            lon: 4.47,
            lat: 51.92,
        };
        assert_eq!(session.report_location(rotterdam), rotterdam);

        let bogus = Coordinate {
            lon: f64::NAN,
            lat: 0.0,
        };
        assert_eq!(session.report_location(bogus), rotterdam);

        session.select_route(Some(11)).unwrap();
        let elsewhere = Coordinate { lon: 0.0, lat: 0.0 };
        assert_eq!(session.report_location(elsewhere), rotterdam);
    }

    #[tokio::test]
    async fn map_without_route_is_empty() {
        let session = handle();
        let svg = session.render_map(&MapOptions::default()).unwrap();
        assert!(!svg.contains("id=\"marker\""));
        assert!(session.render_chart(&ChartOptions::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn reported_location_moves_the_empty_map_center() {
        let session = handle();
        let before = session.render_map(&MapOptions::default()).unwrap();
        session.report_location(Coordinate {
            lon: 4.47,
            lat: 51.92,
        });
        let after = session.render_map(&MapOptions::default()).unwrap();
        assert_ne!(before, after);
        assert!(after.contains(r#"data-lon="4.47000" data-lat="51.92000""#));
    }
}
