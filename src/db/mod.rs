use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::{
    ActivitySnapshot, AlertEvent, AlertQuery, AlertSummaryRow, AlertType, CheckInRecord,
    Checkpoint, HandleStatus, NewCheckIn, Page, RoutePoint, TrackPoint,
};
use crate::store::{
    ActivityStore, AlertStore, CheckInInsert, CheckInStore, ConfigStore, NotificationSink,
    RegistrationStore, RouteStore, TrackStore, UserDirectory,
};

pub mod queries;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(50)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Every collaborator backed by the shared Postgres schema (`sql/schema.sql`).
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn ongoing(&self) -> Result<Vec<ActivitySnapshot>> {
        let rows = sqlx::query_as::<_, ActivitySnapshot>(queries::SELECT_ONGOING_ACTIVITIES)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get(&self, activity_id: i64) -> Result<Option<ActivitySnapshot>> {
        let row = sqlx::query_as::<_, ActivitySnapshot>(queries::SELECT_ACTIVITY)
            .bind(activity_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn approved_users(&self, activity_id: i64) -> Result<Vec<i64>> {
        let users = sqlx::query_scalar::<_, i64>(queries::SELECT_APPROVED_USERS)
            .bind(activity_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn is_approved(&self, user_id: i64, activity_id: i64) -> Result<bool> {
        let approved = sqlx::query_scalar::<_, bool>(queries::SELECT_IS_APPROVED)
            .bind(user_id)
            .bind(activity_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(approved)
    }
}

#[async_trait]
impl RouteStore for PgStore {
    async fn route_points(&self, route_id: i64) -> Result<Vec<RoutePoint>> {
        let rows = sqlx::query_as::<_, RoutePoint>(queries::SELECT_ROUTE_POINTS)
            .bind(route_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn checkpoints(&self, route_id: i64) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query_as::<_, Checkpoint>(queries::SELECT_CHECKPOINTS)
            .bind(route_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn checkpoint(&self, checkpoint_id: i64) -> Result<Option<Checkpoint>> {
        let row = sqlx::query_as::<_, Checkpoint>(queries::SELECT_CHECKPOINT)
            .bind(checkpoint_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl CheckInStore for PgStore {
    async fn exists(&self, user_id: i64, activity_id: i64, checkpoint_id: i64) -> Result<bool> {
        let found = sqlx::query_scalar::<_, bool>(queries::SELECT_CHECK_IN_EXISTS)
            .bind(user_id)
            .bind(activity_id)
            .bind(checkpoint_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    async fn insert(&self, record: NewCheckIn) -> Result<CheckInInsert> {
        let stored = sqlx::query_as::<_, CheckInRecord>(queries::INSERT_CHECK_IN)
            .bind(record.user_id)
            .bind(record.activity_id)
            .bind(record.checkpoint_id)
            .bind(record.check_in_time)
            .bind(record.lat)
            .bind(record.lng)
            .bind(record.distance_to_checkpoint)
            .bind(record.status)
            .bind(record.remark)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match stored {
            Some(r) => CheckInInsert::Inserted(r),
            None => CheckInInsert::Duplicate,
        })
    }

    async fn list_for_user(&self, user_id: i64, activity_id: i64) -> Result<Vec<CheckInRecord>> {
        let rows = sqlx::query_as::<_, CheckInRecord>(queries::SELECT_USER_CHECK_INS)
            .bind(user_id)
            .bind(activity_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_at_checkpoint(&self, activity_id: i64, checkpoint_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(queries::COUNT_CHECK_INS_AT_CHECKPOINT)
            .bind(activity_id)
            .bind(checkpoint_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl TrackStore for PgStore {
    async fn insert(&self, points: &[TrackPoint]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for p in points {
            sqlx::query(queries::INSERT_TRACK_POINT)
                .bind(p.user_id)
                .bind(p.activity_id)
                .bind(p.lat)
                .bind(p.lng)
                .bind(p.elevation)
                .bind(p.accuracy)
                .bind(p.speed)
                .bind(p.record_time)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn recent_within(
        &self,
        user_id: i64,
        activity_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<TrackPoint>> {
        let rows = sqlx::query_as::<_, TrackPoint>(queries::SELECT_RECENT_TRACKS)
            .bind(user_id)
            .bind(activity_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn latest(&self, user_id: i64, activity_id: i64) -> Result<Option<TrackPoint>> {
        let row = sqlx::query_as::<_, TrackPoint>(queries::SELECT_LATEST_TRACK)
            .bind(user_id)
            .bind(activity_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn find_open(
        &self,
        user_id: i64,
        activity_id: i64,
        alert_type: AlertType,
    ) -> Result<Option<AlertEvent>> {
        let row = sqlx::query_as::<_, AlertEvent>(queries::SELECT_OPEN_ALERT)
            .bind(user_id)
            .bind(activity_id)
            .bind(alert_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_if_absent(&self, event: AlertEvent) -> Result<Option<AlertEvent>> {
        let row = sqlx::query_as::<_, AlertEvent>(queries::INSERT_ALERT_IF_ABSENT)
            .bind(event.id)
            .bind(event.activity_id)
            .bind(event.user_id)
            .bind(event.alert_type)
            .bind(event.alert_level)
            .bind(event.lat)
            .bind(event.lng)
            .bind(&event.description)
            .bind(event.trigger_time)
            .bind(event.handle_status)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get(&self, alert_id: Uuid) -> Result<Option<AlertEvent>> {
        let row = sqlx::query_as::<_, AlertEvent>(queries::SELECT_ALERT)
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_handle(
        &self,
        alert_id: Uuid,
        status: HandleStatus,
        operator_id: i64,
        remark: Option<String>,
        handled_at: NaiveDateTime,
    ) -> Result<Option<AlertEvent>> {
        let row = sqlx::query_as::<_, AlertEvent>(queries::UPDATE_ALERT_HANDLE)
            .bind(alert_id)
            .bind(status)
            .bind(operator_id)
            .bind(remark)
            .bind(handled_at)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list(&self, query: &AlertQuery) -> Result<Page<AlertEvent>> {
        let total = sqlx::query_scalar::<_, i64>(queries::COUNT_ALERTS)
            .bind(query.activity_id)
            .bind(query.alert_type)
            .bind(query.alert_level)
            .bind(query.handle_status)
            .bind(query.user_id)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, AlertEvent>(queries::SELECT_ALERT_PAGE)
            .bind(query.activity_id)
            .bind(query.alert_type)
            .bind(query.alert_level)
            .bind(query.handle_status)
            .bind(query.user_id)
            .bind(i64::from(query.page_size()))
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok(Page {
            items,
            total,
            page_num: query.page_num(),
            page_size: query.page_size(),
        })
    }

    async fn count_pending(&self, activity_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(queries::COUNT_PENDING_ALERTS)
            .bind(activity_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn summarize(&self, activity_id: i64) -> Result<Vec<AlertSummaryRow>> {
        let rows = sqlx::query_as::<_, AlertSummaryRow>(queries::SUMMARIZE_ALERTS)
            .bind(activity_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ConfigStore for PgStore {
    async fn get_raw(&self, group: &str, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(queries::SELECT_DICT_VALUE)
            .bind(group)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn is_admin(&self, user_id: i64) -> Result<bool> {
        let admin = sqlx::query_scalar::<_, bool>(queries::SELECT_IS_ADMIN)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(admin)
    }

    async fn nickname(&self, user_id: i64) -> Result<Option<String>> {
        let nickname = sqlx::query_scalar::<_, Option<String>>(queries::SELECT_NICKNAME)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(nickname.flatten())
    }
}

#[async_trait]
impl NotificationSink for PgStore {
    async fn notify_organizer(&self, activity_id: i64, title: &str, body: &str) -> Result<()> {
        let result = sqlx::query(queries::INSERT_ORGANIZER_MESSAGE)
            .bind(activity_id)
            .bind(title)
            .bind(body)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("activity {} has no organizer to notify", activity_id);
        }
        Ok(())
    }
}
