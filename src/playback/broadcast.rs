use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlaybackState {
    pub route_id: Option<i64>,
    pub point_index: usize,
    pub distance: f64,
    pub animating: bool,
}

impl PlaybackState {
    fn key(&self) -> (Option<i64>, usize, bool) {
        (self.route_id, self.point_index, self.animating)
    }
}

/// A published state. `version` grows by one with every publication.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PlaybackSnapshot {
    pub version: u64,
    #[serde(flatten)]
    pub state: PlaybackState,
}

/// Leading-edge throttle: the first value passes, later ones are dropped
/// until `interval` has elapsed since the last pass.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_pass: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_pass: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last_pass {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_pass = Some(now);
                true
            }
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_pass = Some(now);
    }
}

/// Fans the playback position out to map/chart consumers.
///
/// Animation updates are deduplicated and throttled; each emission schedules
/// a settle refresh carrying the latest offered state, replacing any pending
/// one. Direct user actions go out immediately.
pub struct IndexBroadcaster {
    tx: Arc<watch::Sender<PlaybackSnapshot>>,
    latest: Arc<Mutex<PlaybackState>>,
    last_key: Option<(Option<i64>, usize, bool)>,
    throttle: Throttle,
    settle_delay: Duration,
    settle: Option<JoinHandle<()>>,
}

impl IndexBroadcaster {
    pub fn new(interval: Duration, settle_delay: Duration) -> Self {
        let (tx, _) = watch::channel(PlaybackSnapshot::default());
        Self {
            tx: Arc::new(tx),
            latest: Arc::new(Mutex::new(PlaybackState::default())),
            last_key: None,
            throttle: Throttle::new(interval),
            settle_delay,
            settle: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> PlaybackSnapshot {
        *self.tx.borrow()
    }

    /// Returns whether the state went out right away.
    pub fn offer(&mut self, state: PlaybackState) -> bool {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = state;

        let key = state.key();
        if self.last_key == Some(key) {
            return false;
        }
        self.last_key = Some(key);

        if !self.throttle.ready(Instant::now()) {
            return false;
        }

        send(&self.tx, state);
        self.schedule_settle();
        true
    }

    pub fn publish_now(&mut self, state: PlaybackState) -> PlaybackSnapshot {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.last_key = Some(state.key());
        self.throttle.mark(Instant::now());
        self.cancel_settle();
        send(&self.tx, state)
    }

    fn schedule_settle(&mut self) {
        self.cancel_settle();
        let tx = Arc::clone(&self.tx);
        let latest = Arc::clone(&self.latest);
        let delay = self.settle_delay;
        self.settle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let state = *latest.lock().unwrap_or_else(PoisonError::into_inner);
            send(&tx, state);
        }));
    }

    fn cancel_settle(&mut self) {
        if let Some(handle) = self.settle.take() {
            handle.abort();
        }
    }
}

impl Drop for IndexBroadcaster {
    fn drop(&mut self) {
        self.cancel_settle();
    }
}

fn send(tx: &watch::Sender<PlaybackSnapshot>, state: PlaybackState) -> PlaybackSnapshot {
    let mut published = PlaybackSnapshot::default();
    tx.send_modify(|snapshot| {
        snapshot.version += 1;
        snapshot.state = state;
        published = *snapshot;
    });
    published
}
