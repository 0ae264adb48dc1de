use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted GPS sample (`track_record` row).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackPoint {
    pub user_id: i64,
    pub activity_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub elevation: Option<i32>,
    pub accuracy: Option<i32>,
    pub speed: Option<f64>,
    pub record_time: NaiveDateTime,
}

/// A GPS sample as uploaded by a participant, before it is bound to a user/activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    pub lat: f64,
    pub lng: f64,
    pub elevation: Option<i32>,
    pub accuracy: Option<i32>,
    pub speed: Option<f64>,
    pub record_time: NaiveDateTime,
}

impl TrackSample {
    pub fn into_point(self, user_id: i64, activity_id: i64) -> TrackPoint {
        TrackPoint {
            user_id,
            activity_id,
            lat: self.lat,
            lng: self.lng,
            elevation: self.elevation,
            accuracy: self.accuracy,
            speed: self.speed,
            record_time: self.record_time,
        }
    }
}
