use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, LoadError};
use crate::pipeline::load;
use crate::session::SessionHandle;
use crate::types::route::Route;
use crate::types::viz::{ChartOptions, MapOptions};

/// Ordered route list shared by every session.
///
/// Entries are swapped whole, so readers see a route either before or after
/// its distances were attached.
#[derive(Clone, Default)]
pub struct RouteCatalog {
    routes: Arc<RwLock<Vec<Arc<Route>>>>,
}

impl RouteCatalog {
    pub fn replace(&self, routes: Vec<Route>) {
        let routes = routes.into_iter().map(Arc::new).collect();
        *self.routes.write().unwrap_or_else(PoisonError::into_inner) = routes;
    }

    /// Attaches segment distances to every route that lacks them.
    pub fn enrich(&self) -> usize {
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        let mut enriched = 0;
        for route in routes.iter_mut() {
            if !route.distances_ready() {
                *route = Arc::new(route.with_distances());
                enriched += 1;
            }
        }
        enriched
    }

    pub fn all(&self) -> Vec<Arc<Route>> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, route_id: i64) -> Option<Arc<Route>> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|route| route.route_id == route_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    catalog: RouteCatalog,
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            catalog: RouteCatalog::default(),
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    pub fn map_options(&self) -> MapOptions {
        MapOptions::new(
            self.config.map_width,
            self.config.map_height,
            self.config.max_speed,
        )
    }

    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            width: self.config.map_width,
            ..ChartOptions::default()
        }
    }

    pub fn route(&self, route_id: i64) -> Result<Arc<Route>, AppError> {
        self.catalog
            .get(route_id)
            .ok_or(AppError::RouteNotFound(route_id))
    }

    pub fn create_session(&self) -> (String, SessionHandle) {
        let session_id = Uuid::new_v4().to_string();
        let handle = SessionHandle::new(self.catalog.clone(), Arc::clone(&self.config));
        self.sessions.insert(session_id.clone(), handle.clone());
        tracing::info!("Created session {}", session_id);
        (session_id, handle)
    }

    pub fn session(&self, session_id: &str) -> Result<SessionHandle, AppError> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        handle.touch();
        Ok(handle)
    }

    pub fn evict_expired(&self, ttl: Duration) {
        self.sessions.retain(|session_id, handle| {
            let keep = !handle.is_expired(ttl);
            if !keep {
                handle.shutdown();
                tracing::debug!("Evicting idle session {}", session_id);
            }
            keep
        });
        tracing::info!("Session eviction complete. Current size: {}", self.sessions.len());
    }

    /// Loads the catalog, then attaches distances after the configured delay.
    /// Failures leave the catalog as it was.
    pub async fn load_routes(&self) {
        match self.refresh_catalog().await {
            Ok(_) => self.enrich_after_delay().await,
            Err(err) => tracing::warn!("Route loading failed: {}", err),
        }
    }

    /// Fetches the routes source and swaps the catalog. Distances are not
    /// attached yet.
    pub async fn refresh_catalog(&self) -> Result<usize, LoadError> {
        let source = &self.config.routes_source;
        let routes = load::fetch_routes(source).await?;
        tracing::info!("Loaded {} routes from {}", routes.len(), source);
        let count = routes.len();
        self.catalog.replace(routes);
        Ok(count)
    }

    pub async fn enrich_after_delay(&self) {
        tokio::time::sleep(self.config.distance_delay).await;
        let enriched = self.catalog.enrich();
        tracing::info!("Attached distances to {} routes", enriched);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::route::Point;

    fn raw_route(route_id: i64) -> Route {
        Route {
            route_id,
            from_port: "A".to_string(),
            to_port: "B".to_string(),
            leg_duration: 0,
            all_distance: 0.0,
            points: vec![
                Point::new(0.0, 0.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 10.0, 2.0),
            ],
        }
    }

    #[test]
    fn catalog_keeps_order_and_enriches_once() {
        let catalog = RouteCatalog::default();
        catalog.replace(vec![raw_route(9), raw_route(4)]);
        let ids: Vec<i64> = catalog.all().iter().map(|r| r.route_id).collect();
        assert_eq!(ids, vec![9, 4]);

        assert_eq!(catalog.enrich(), 2);
        assert_eq!(catalog.enrich(), 0);
        assert_eq!(catalog.get(4).map(|r| r.all_distance), Some(20.0));
        assert!(catalog.get(5).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn load_routes_from_file_attaches_distances_after_delay() {
        let path = std::env::temp_dir().join(format!("routes-{}.csv", Uuid::new_v4()));
        std::fs::write(
            &path,
            "\"route_id\",\"from_port\",\"to_port\",\"leg_duration\",\"points\"\n\"1\",\"A\",\"B\",\"5\",\"[[0,0,0,0],[0,0,10,2],[0,0,20,3]]\"\n",
        )
        .unwrap();

        let config = Config {
            routes_source: path.to_string_lossy().to_string(),
            ..Config::default()
        };
        let state = AppState::new(config);
        state.load_routes().await;
        std::fs::remove_file(&path).ok();

        let route = state.route(1).unwrap();
        assert!(route.distances_ready());
        assert_eq!(route.all_distance, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn five_entry_tuples_still_get_derived_distances() {
        let path = std::env::temp_dir().join(format!("routes-{}.csv", Uuid::new_v4()));
        std::fs::write(
            &path,
            "\"route_id\",\"points\"\n\"1\",\"[[0,0,0,0,9],[0,0,10,2,9],[0,0,20,3,9]]\"\n",
        )
        .unwrap();

        let config = Config {
            routes_source: path.to_string_lossy().to_string(),
            ..Config::default()
        };
        let state = AppState::new(config);
        state.load_routes().await;
        std::fs::remove_file(&path).ok();

        let route = state.route(1).unwrap();
        assert_eq!(route.all_distance, 50.0);
        let segments: Vec<Option<f64>> = route.points.iter().map(|p| p.segment_distance).collect();
        assert_eq!(segments, vec![Some(0.0), Some(20.0), Some(30.0)]);
    }

    #[tokio::test]
    async fn refresh_reports_unreachable_source() {
        let config = Config {
            routes_source: "/no/such/routes.csv".to_string(),
            ..Config::default()
        };
        let state = AppState::new(config);
        assert!(matches!(state.refresh_catalog().await, Err(LoadError::Io(_))));
    }

    #[tokio::test]
    async fn failed_load_leaves_catalog_empty() {
        let config = Config {
            routes_source: "/no/such/routes.csv".to_string(),
            ..Config::default()
        };
        let state = AppState::new(config);
        state.load_routes().await;
        assert!(state.catalog().is_empty());
    }

    #[test]
    fn unknown_session_is_not_found() {
        let state = AppState::new(Config::default());
        assert!(matches!(
            state.session("nope"),
            Err(AppError::SessionNotFound(_))
        ));
    }
}
