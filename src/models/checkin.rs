use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use super::route::{Checkpoint, CheckpointType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[repr(i16)]
pub enum CheckInStatus {
    Normal = 1,
    Late = 2,
    /// Administrative backfill; never produced by a participant check-in.
    Makeup = 3,
}

impl CheckInStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CheckInStatus::Normal => "On time",
            CheckInStatus::Late => "Late",
            CheckInStatus::Makeup => "Makeup",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CheckInRecord {
    pub id: i64,
    pub user_id: i64,
    pub activity_id: i64,
    pub checkpoint_id: i64,
    pub check_in_time: NaiveDateTime,
    pub lat: f64,
    pub lng: f64,
    pub distance_to_checkpoint: i32,
    pub status: CheckInStatus,
    pub remark: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub user_id: i64,
    pub activity_id: i64,
    pub checkpoint_id: i64,
    pub check_in_time: NaiveDateTime,
    pub lat: f64,
    pub lng: f64,
    pub distance_to_checkpoint: i32,
    pub status: CheckInStatus,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointProgress {
    pub checkpoint_id: i64,
    pub name: String,
    pub sequence: i32,
    pub checkpoint_type: CheckpointType,
    pub is_required: bool,
    pub record: Option<CheckInRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInProgress {
    pub activity_id: i64,
    pub user_id: i64,
    pub total_checkpoints: usize,
    pub checked_in_count: usize,
    /// Integer percentage, 0 when the route has no checkpoints.
    pub progress: u32,
    pub checkpoints: Vec<CheckpointProgress>,
}

/// One participant's progress, as shown to the organizer.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantProgress {
    pub user_id: i64,
    pub nickname: Option<String>,
    pub progress: CheckInProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointStats {
    pub checkpoint: Checkpoint,
    pub checked_count: i64,
    pub total_count: i64,
    pub completion_rate: u32,
}
