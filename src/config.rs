use std::time::Duration;

use crate::types::color::DEFAULT_MAX_SPEED;

pub const DEFAULT_ROUTES_SOURCE: &str =
    "https://raw.githubusercontent.com/Marcura/frontend-developer-test/master/web_challenge.csv";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// URL or local path of the routes CSV.
    pub routes_source: String,
    /// Delay between publishing parsed routes and attaching their distances.
    pub distance_delay: Duration,
    /// Minimum spacing of playback index broadcasts.
    pub broadcast_interval: Duration,
    /// Follow-up refresh after each broadcast.
    pub settle_delay: Duration,
    pub frame_interval: Duration,
    /// Playback distance per millisecond, scaled by 1e6.
    pub animation_speed: f64,
    pub max_speed: f64,
    pub session_ttl: Duration,
    pub map_width: u32,
    pub map_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            routes_source: DEFAULT_ROUTES_SOURCE.to_string(),
            distance_delay: Duration::from_millis(500),
            broadcast_interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(300),
            frame_interval: Duration::from_millis(16),
            animation_speed: 300.0,
            max_speed: DEFAULT_MAX_SPEED,
            session_ttl: Duration::from_secs(3600),
            map_width: 1280,
            map_height: 800,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            routes_source: std::env::var("ROUTES_SOURCE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.routes_source),
            distance_delay: env_millis("DISTANCE_DELAY_MS").unwrap_or(defaults.distance_delay),
            broadcast_interval: env_millis("BROADCAST_INTERVAL_MS")
                .unwrap_or(defaults.broadcast_interval),
            settle_delay: env_millis("SETTLE_DELAY_MS").unwrap_or(defaults.settle_delay),
            frame_interval: env_millis("FRAME_INTERVAL_MS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.frame_interval),
            animation_speed: env_parse::<f64>("ANIMATION_SPEED")
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.animation_speed),
            max_speed: env_parse::<f64>("MAX_SPEED")
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.max_speed),
            session_ttl: env_parse("SESSION_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            map_width: env_parse("MAP_WIDTH").unwrap_or(defaults.map_width),
            map_height: env_parse("MAP_HEIGHT").unwrap_or(defaults.map_height),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse(key).map(Duration::from_millis)
}
