//! Contracts of the collaborators the safety subsystem reads from and writes to.
//!
//! Postgres implementations live in [`crate::db`]; an in-memory implementation
//! backs the unit tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::{
    ActivitySnapshot, AlertEvent, AlertQuery, AlertSummaryRow, AlertType, CheckInRecord,
    Checkpoint, HandleStatus, NewCheckIn, Page, RoutePoint, TrackPoint,
};

#[cfg(test)]
pub mod memory;

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn ongoing(&self) -> Result<Vec<ActivitySnapshot>>;
    async fn get(&self, activity_id: i64) -> Result<Option<ActivitySnapshot>>;
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn approved_users(&self, activity_id: i64) -> Result<Vec<i64>>;
    async fn is_approved(&self, user_id: i64, activity_id: i64) -> Result<bool>;
}

#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Route vertices ordered by sequence.
    async fn route_points(&self, route_id: i64) -> Result<Vec<RoutePoint>>;
    /// Checkpoints ordered by sequence.
    async fn checkpoints(&self, route_id: i64) -> Result<Vec<Checkpoint>>;
    async fn checkpoint(&self, checkpoint_id: i64) -> Result<Option<Checkpoint>>;
}

/// Outcome of a check-in insert against the (user, activity, checkpoint) uniqueness rule.
#[derive(Debug)]
pub enum CheckInInsert {
    Inserted(CheckInRecord),
    Duplicate,
}

#[async_trait]
pub trait CheckInStore: Send + Sync {
    async fn exists(&self, user_id: i64, activity_id: i64, checkpoint_id: i64) -> Result<bool>;
    async fn insert(&self, record: NewCheckIn) -> Result<CheckInInsert>;
    async fn list_for_user(&self, user_id: i64, activity_id: i64) -> Result<Vec<CheckInRecord>>;
    async fn count_at_checkpoint(&self, activity_id: i64, checkpoint_id: i64) -> Result<i64>;
}

#[async_trait]
pub trait TrackStore: Send + Sync {
    async fn insert(&self, points: &[TrackPoint]) -> Result<()>;
    /// Points recorded at or after `since`, newest first.
    async fn recent_within(
        &self,
        user_id: i64,
        activity_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<TrackPoint>>;
    async fn latest(&self, user_id: i64, activity_id: i64) -> Result<Option<TrackPoint>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn find_open(
        &self,
        user_id: i64,
        activity_id: i64,
        alert_type: AlertType,
    ) -> Result<Option<AlertEvent>>;
    /// Inserts the alert unless an open alert with the same (user, activity, type)
    /// exists. Must be atomic with respect to concurrent callers.
    async fn insert_if_absent(&self, event: AlertEvent) -> Result<Option<AlertEvent>>;
    async fn get(&self, alert_id: Uuid) -> Result<Option<AlertEvent>>;
    /// Moves an open alert to `status`; returns `None` when the alert is missing or already closed.
    async fn update_handle(
        &self,
        alert_id: Uuid,
        status: HandleStatus,
        operator_id: i64,
        remark: Option<String>,
        handled_at: NaiveDateTime,
    ) -> Result<Option<AlertEvent>>;
    async fn list(&self, query: &AlertQuery) -> Result<Page<AlertEvent>>;
    async fn count_pending(&self, activity_id: i64) -> Result<i64>;
    async fn summarize(&self, activity_id: i64) -> Result<Vec<AlertSummaryRow>>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_raw(&self, group: &str, key: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn is_admin(&self, user_id: i64) -> Result<bool>;
    async fn nickname(&self, user_id: i64) -> Result<Option<String>>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_organizer(&self, activity_id: i64, title: &str, body: &str) -> Result<()>;
}

/// The full set of collaborators, shared by every service.
#[derive(Clone)]
pub struct Stores {
    pub activities: Arc<dyn ActivityStore>,
    pub registrations: Arc<dyn RegistrationStore>,
    pub routes: Arc<dyn RouteStore>,
    pub check_ins: Arc<dyn CheckInStore>,
    pub tracks: Arc<dyn TrackStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub config: Arc<dyn ConfigStore>,
    pub users: Arc<dyn UserDirectory>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl Stores {
    /// Uses one backend for every collaborator.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: ActivityStore
            + RegistrationStore
            + RouteStore
            + CheckInStore
            + TrackStore
            + AlertStore
            + ConfigStore
            + UserDirectory
            + NotificationSink
            + 'static,
    {
        Self {
            activities: backend.clone(),
            registrations: backend.clone(),
            routes: backend.clone(),
            check_ins: backend.clone(),
            tracks: backend.clone(),
            alerts: backend.clone(),
            config: backend.clone(),
            users: backend.clone(),
            notifications: backend,
        }
    }
}
