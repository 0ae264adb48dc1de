use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

/// Geofence radius used when a checkpoint has none configured.
pub const DEFAULT_CHECKPOINT_RADIUS_METERS: i32 = 100;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoutePoint {
    pub route_id: i64,
    pub sequence: i32,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[repr(i16)]
pub enum CheckpointType {
    Gathering = 1,
    Waypoint = 2,
    Finish = 3,
}

impl CheckpointType {
    pub fn label(&self) -> &'static str {
        match self {
            CheckpointType::Gathering => "Gathering point",
            CheckpointType::Waypoint => "Waypoint",
            CheckpointType::Finish => "Finish",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Checkpoint {
    pub id: i64,
    pub route_id: i64,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub radius_meters: Option<i32>,
    pub sequence: i32,
    pub checkpoint_type: CheckpointType,
    pub is_required: bool,
    /// Minutes after activity start at which participants should arrive.
    pub expected_arrive_minutes: Option<i32>,
}

impl Checkpoint {
    pub fn effective_radius(&self) -> i32 {
        self.radius_meters.unwrap_or(DEFAULT_CHECKPOINT_RADIUS_METERS)
    }

    pub fn expected_arrival(&self, activity_start: NaiveDateTime) -> Option<NaiveDateTime> {
        self.expected_arrive_minutes
            .map(|m| activity_start + Duration::minutes(i64::from(m)))
    }
}
