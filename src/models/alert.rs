use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum AlertType {
    RouteDeviation = 1,
    SevereDeviation = 2,
    LongStationary = 3,
    TimeoutNoCheckin = 4,
    LostContact = 5,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        AlertType::RouteDeviation,
        AlertType::SevereDeviation,
        AlertType::LongStationary,
        AlertType::TimeoutNoCheckin,
        AlertType::LostContact,
    ];

    pub fn level(&self) -> AlertLevel {
        match self {
            AlertType::RouteDeviation | AlertType::TimeoutNoCheckin => AlertLevel::Warning,
            AlertType::SevereDeviation | AlertType::LongStationary | AlertType::LostContact => {
                AlertLevel::Severe
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertType::RouteDeviation => "Route deviation",
            AlertType::SevereDeviation => "Severe deviation",
            AlertType::LongStationary => "Long stationary",
            AlertType::TimeoutNoCheckin => "Check-in overdue",
            AlertType::LostContact => "Lost contact",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum AlertLevel {
    Warning = 1,
    Severe = 2,
}

impl AlertLevel {
    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::Warning => "Warning",
            AlertLevel::Severe => "Severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum HandleStatus {
    Pending = 0,
    Processing = 1,
    Resolved = 2,
    Ignored = 3,
}

impl HandleStatus {
    /// Open alerts block a new alert of the same kind for the same participant.
    pub fn is_open(&self) -> bool {
        matches!(self, HandleStatus::Pending | HandleStatus::Processing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HandleStatus::Pending => "Pending",
            HandleStatus::Processing => "Processing",
            HandleStatus::Resolved => "Resolved",
            HandleStatus::Ignored => "Ignored",
        }
    }
}

/// Status an organizer may move an open alert to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleAction {
    Processing,
    Resolved,
    Ignored,
}

impl From<HandleAction> for HandleStatus {
    fn from(action: HandleAction) -> Self {
        match action {
            HandleAction::Processing => HandleStatus::Processing,
            HandleAction::Resolved => HandleStatus::Resolved,
            HandleAction::Ignored => HandleStatus::Ignored,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub activity_id: i64,
    pub user_id: i64,
    pub alert_type: AlertType,
    pub alert_level: AlertLevel,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub description: String,
    pub trigger_time: NaiveDateTime,
    pub handle_status: HandleStatus,
    pub handle_by: Option<i64>,
    pub handle_time: Option<NaiveDateTime>,
    pub handle_remark: Option<String>,
}

/// An alert as listed to organizers, with display names and status text.
#[derive(Debug, Clone, Serialize)]
pub struct AlertListItem {
    #[serde(flatten)]
    pub alert: AlertEvent,
    pub activity_title: Option<String>,
    pub user_nickname: Option<String>,
    pub handler_nickname: Option<String>,
    pub type_label: &'static str,
    pub level_label: &'static str,
    pub status_label: &'static str,
}

impl AlertListItem {
    pub fn new(alert: AlertEvent) -> Self {
        Self {
            type_label: alert.alert_type.label(),
            level_label: alert.alert_level.label(),
            status_label: alert.handle_status.label(),
            activity_title: None,
            user_nickname: None,
            handler_nickname: None,
            alert,
        }
    }
}

/// A detection result waiting to be persisted.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub activity_id: i64,
    pub user_id: i64,
    pub alert_type: AlertType,
    pub description: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl NewAlert {
    pub fn into_event(self, trigger_time: NaiveDateTime) -> AlertEvent {
        AlertEvent {
            id: Uuid::new_v4(),
            activity_id: self.activity_id,
            user_id: self.user_id,
            alert_level: self.alert_type.level(),
            alert_type: self.alert_type,
            lat: self.lat,
            lng: self.lng,
            description: self.description,
            trigger_time,
            handle_status: HandleStatus::Pending,
            handle_by: None,
            handle_time: None,
            handle_remark: None,
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filters for alert listings. `activity_id: None` lists across all activities.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    pub activity_id: Option<i64>,
    pub alert_type: Option<AlertType>,
    pub alert_level: Option<AlertLevel>,
    pub handle_status: Option<HandleStatus>,
    pub user_id: Option<i64>,
    pub page_num: Option<u32>,
    pub page_size: Option<u32>,
}

impl AlertQuery {
    pub fn page_num(&self) -> u32 {
        self.page_num.unwrap_or(1).max(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page_num() - 1) * i64::from(self.page_size())
    }

    pub fn matches(&self, alert: &AlertEvent) -> bool {
        self.activity_id.map_or(true, |id| alert.activity_id == id)
            && self.alert_type.map_or(true, |t| alert.alert_type == t)
            && self.alert_level.map_or(true, |l| alert.alert_level == l)
            && self.handle_status.map_or(true, |s| alert.handle_status == s)
            && self.user_id.map_or(true, |u| alert.user_id == u)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page_num: u32,
    pub page_size: u32,
}

/// Grouped alert counts for one activity.
#[derive(Debug, Clone, FromRow)]
pub struct AlertSummaryRow {
    pub alert_type: AlertType,
    pub alert_level: AlertLevel,
    pub handle_status: HandleStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub alert_type: AlertType,
    pub label: &'static str,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub resolved: i64,
    pub ignored: i64,
    pub severe: i64,
    pub by_type: Vec<TypeCount>,
}

impl AlertStats {
    pub fn from_summary(rows: &[AlertSummaryRow]) -> Self {
        let mut stats = AlertStats::default();
        for row in rows {
            stats.total += row.count;
            match row.handle_status {
                HandleStatus::Pending => stats.pending += row.count,
                HandleStatus::Processing => stats.processing += row.count,
                HandleStatus::Resolved => stats.resolved += row.count,
                HandleStatus::Ignored => stats.ignored += row.count,
            }
            if row.alert_level == AlertLevel::Severe {
                stats.severe += row.count;
            }
        }
        stats.by_type = AlertType::ALL
            .iter()
            .map(|t| TypeCount {
                alert_type: *t,
                label: t.label(),
                count: rows
                    .iter()
                    .filter(|r| r.alert_type == *t)
                    .map(|r| r.count)
                    .sum(),
            })
            .filter(|c| c.count > 0)
            .collect();
        stats
    }
}
