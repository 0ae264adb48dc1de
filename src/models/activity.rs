use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::FromRow;

/// Lifecycle state of an activity, stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[repr(i16)]
pub enum ActivityStatus {
    Draft = 0,
    PendingReview = 1,
    Published = 2,
    Ongoing = 3,
    Ended = 4,
    Cancelled = 5,
    Rejected = 6,
}

/// Read-only view of an activity as the safety subsystem needs it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActivitySnapshot {
    pub id: i64,
    pub title: String,
    pub organizer_id: i64,
    pub route_id: Option<i64>,
    pub status: ActivityStatus,
    pub activity_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ActivitySnapshot {
    pub fn is_ongoing(&self) -> bool {
        self.status == ActivityStatus::Ongoing
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.activity_date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.activity_date.and_time(self.end_time)
    }
}
