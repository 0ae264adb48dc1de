//! Fixtures shared by the processor tests.

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime};
use tokio::sync::mpsc::Receiver;

use super::alert_detector::AlertDetector;
use super::alert_lifecycle::AlertLifecycle;
use super::checkin::CheckInValidator;
use super::config_provider::ConfigProvider;
use super::notifier::{AlertNotifier, AlertRaised, NotificationDispatcher};
use super::track_ingestor::TrackIngestor;
use crate::clock::ManualClock;
use crate::models::{ActivitySnapshot, ActivityStatus, Checkpoint, CheckpointType, TrackSample};
use crate::store::memory::MemoryStore;
use crate::store::Stores;

pub const ROUTE_ID: i64 = 10;
pub const ORGANIZER_ID: i64 = 100;
pub const START_LAT: f64 = 46.5;
pub const START_LNG: f64 = 7.9;

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

pub fn sample(lat: f64, lng: f64, time: &str) -> TrackSample {
    TrackSample {
        lat,
        lng,
        elevation: None,
        accuracy: None,
        speed: None,
        record_time: at(time),
    }
}

pub fn checkpoint(
    id: i64,
    name: &str,
    lat: f64,
    lng: f64,
    radius_meters: Option<i32>,
    sequence: i32,
    expected_arrive_minutes: Option<i32>,
) -> Checkpoint {
    Checkpoint {
        id,
        route_id: ROUTE_ID,
        name: name.to_string(),
        lat,
        lng,
        radius_meters,
        sequence,
        checkpoint_type: CheckpointType::Waypoint,
        is_required: true,
        expected_arrive_minutes,
    }
}

/// Ongoing eight-hour activity on [`ROUTE_ID`], organized by [`ORGANIZER_ID`].
pub fn activity_at(id: i64, start: &str) -> ActivitySnapshot {
    activity_with_route(id, start, Some(ROUTE_ID))
}

pub fn activity_with_route(id: i64, start: &str, route_id: Option<i64>) -> ActivitySnapshot {
    let start = at(start);
    let end = start + Duration::hours(8);
    ActivitySnapshot {
        id,
        title: "Ridge Walk".to_string(),
        organizer_id: ORGANIZER_ID,
        route_id,
        status: ActivityStatus::Ongoing,
        activity_date: start.date(),
        start_time: start.time(),
        end_time: end.time(),
    }
}

/// Every service wired against one [`MemoryStore`] and a manual clock.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub detector: AlertDetector,
    pub ingestor: TrackIngestor,
    pub checkins: CheckInValidator,
    pub lifecycle: AlertLifecycle,
    rx: Mutex<Receiver<AlertRaised>>,
}

impl Harness {
    /// Activity 1 started at `start`, following an eastbound route of ten 100 m legs
    /// beginning at ([`START_LAT`], [`START_LNG`]).
    pub fn ongoing(start: &str, now: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.add_activity(activity_at(1, start));
        let lng_step = 100.0 / (111_320.0 * START_LAT.to_radians().cos());
        let vertices: Vec<(f64, f64)> = (0..=10i32)
            .map(|i| (START_LAT, START_LNG + f64::from(i) * lng_step))
            .collect();
        store.set_route(ROUTE_ID, &vertices);

        let clock = Arc::new(ManualClock::new(at(now)));
        let stores = Stores::from_backend(store.clone());
        let config = ConfigProvider::new(stores.config.clone(), "alert_config");
        let (notifier, rx) = AlertNotifier::channel(64);
        let detector = AlertDetector::new(stores.clone(), config, notifier, clock.clone());

        Self {
            ingestor: TrackIngestor::new(stores.clone(), detector.clone()),
            checkins: CheckInValidator::new(stores.clone(), clock.clone()),
            lifecycle: AlertLifecycle::new(stores, clock.clone()),
            detector,
            store,
            clock,
            rx: Mutex::new(rx),
        }
    }

    /// Delivers every queued notice and returns the organizer inbox.
    pub async fn drain_notices(&self) -> Vec<(i64, String, String)> {
        let mut pending = Vec::new();
        {
            let mut rx = self.rx.lock().unwrap();
            while let Ok(event) = rx.try_recv() {
                pending.push(event);
            }
        }
        let dispatcher =
            NotificationDispatcher::new(self.store.clone(), self.store.clone(), self.store.clone());
        for event in pending {
            dispatcher.deliver(&event.alert).await.unwrap();
        }
        self.store.notices()
    }
}
