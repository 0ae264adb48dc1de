use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use super::{
    ActivityStore, AlertStore, CheckInInsert, CheckInStore, ConfigStore, NotificationSink,
    RegistrationStore, RouteStore, TrackStore, UserDirectory,
};
use crate::models::{
    ActivitySnapshot, AlertEvent, AlertQuery, AlertSummaryRow, AlertType, CheckInRecord,
    Checkpoint, HandleStatus, NewCheckIn, Page, RoutePoint, TrackPoint,
};

#[derive(Default)]
struct State {
    activities: HashMap<i64, ActivitySnapshot>,
    approved: BTreeSet<(i64, i64)>,
    route_points: HashMap<i64, Vec<RoutePoint>>,
    checkpoints: Vec<Checkpoint>,
    check_ins: Vec<CheckInRecord>,
    tracks: Vec<TrackPoint>,
    alerts: Vec<AlertEvent>,
    config: HashMap<(String, String), String>,
    config_down: bool,
    admins: HashSet<i64>,
    nicknames: HashMap<i64, String>,
    notices: Vec<(i64, String, String)>,
    notify_down: bool,
    broken_routes: HashSet<i64>,
}

/// Every collaborator in one process-local store, with the same uniqueness rules as the DDL.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_activity(&self, activity: ActivitySnapshot) {
        self.state.lock().unwrap().activities.insert(activity.id, activity);
    }

    pub fn approve(&self, user_id: i64, activity_id: i64) {
        self.state.lock().unwrap().approved.insert((activity_id, user_id));
    }

    pub fn set_route(&self, route_id: i64, vertices: &[(f64, f64)]) {
        let points = vertices
            .iter()
            .enumerate()
            .map(|(i, (lat, lng))| RoutePoint {
                route_id,
                sequence: i as i32 + 1,
                lat: *lat,
                lng: *lng,
            })
            .collect();
        self.state.lock().unwrap().route_points.insert(route_id, points);
    }

    pub fn add_checkpoint(&self, checkpoint: Checkpoint) {
        let mut state = self.state.lock().unwrap();
        state.checkpoints.push(checkpoint);
        state.checkpoints.sort_by_key(|c| (c.route_id, c.sequence));
    }

    pub fn set_config(&self, group: &str, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .config
            .insert((group.to_string(), key.to_string()), value.to_string());
    }

    pub fn set_config_down(&self, down: bool) {
        self.state.lock().unwrap().config_down = down;
    }

    pub fn make_admin(&self, user_id: i64) {
        self.state.lock().unwrap().admins.insert(user_id);
    }

    pub fn set_nickname(&self, user_id: i64, nickname: &str) {
        self.state
            .lock()
            .unwrap()
            .nicknames
            .insert(user_id, nickname.to_string());
    }

    pub fn set_notify_down(&self, down: bool) {
        self.state.lock().unwrap().notify_down = down;
    }

    /// Makes every read of this route's data fail.
    pub fn break_route(&self, route_id: i64) {
        self.state.lock().unwrap().broken_routes.insert(route_id);
    }

    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.state.lock().unwrap().alerts.clone()
    }

    pub fn notices(&self) -> Vec<(i64, String, String)> {
        self.state.lock().unwrap().notices.clone()
    }

    pub fn tracks(&self) -> Vec<TrackPoint> {
        self.state.lock().unwrap().tracks.clone()
    }

    pub fn check_ins(&self) -> Vec<CheckInRecord> {
        self.state.lock().unwrap().check_ins.clone()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn ongoing(&self) -> Result<Vec<ActivitySnapshot>> {
        let state = self.state.lock().unwrap();
        let mut list: Vec<_> = state
            .activities
            .values()
            .filter(|a| a.is_ongoing())
            .cloned()
            .collect();
        list.sort_by_key(|a| a.id);
        Ok(list)
    }

    async fn get(&self, activity_id: i64) -> Result<Option<ActivitySnapshot>> {
        Ok(self.state.lock().unwrap().activities.get(&activity_id).cloned())
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn approved_users(&self, activity_id: i64) -> Result<Vec<i64>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .approved
            .range((activity_id, i64::MIN)..=(activity_id, i64::MAX))
            .map(|(_, user)| *user)
            .collect())
    }

    async fn is_approved(&self, user_id: i64, activity_id: i64) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .approved
            .contains(&(activity_id, user_id)))
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn route_points(&self, route_id: i64) -> Result<Vec<RoutePoint>> {
        let state = self.state.lock().unwrap();
        if state.broken_routes.contains(&route_id) {
            bail!("route {} is unreadable", route_id);
        }
        Ok(state.route_points.get(&route_id).cloned().unwrap_or_default())
    }

    async fn checkpoints(&self, route_id: i64) -> Result<Vec<Checkpoint>> {
        let state = self.state.lock().unwrap();
        if state.broken_routes.contains(&route_id) {
            bail!("route {} is unreadable", route_id);
        }
        Ok(state
            .checkpoints
            .iter()
            .filter(|c| c.route_id == route_id)
            .cloned()
            .collect())
    }

    async fn checkpoint(&self, checkpoint_id: i64) -> Result<Option<Checkpoint>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .checkpoints
            .iter()
            .find(|c| c.id == checkpoint_id)
            .cloned())
    }
}

#[async_trait]
impl CheckInStore for MemoryStore {
    async fn exists(&self, user_id: i64, activity_id: i64, checkpoint_id: i64) -> Result<bool> {
        Ok(self.state.lock().unwrap().check_ins.iter().any(|r| {
            r.user_id == user_id && r.activity_id == activity_id && r.checkpoint_id == checkpoint_id
        }))
    }

    async fn insert(&self, record: NewCheckIn) -> Result<CheckInInsert> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.check_ins.iter().any(|r| {
            r.user_id == record.user_id
                && r.activity_id == record.activity_id
                && r.checkpoint_id == record.checkpoint_id
        });
        if duplicate {
            return Ok(CheckInInsert::Duplicate);
        }
        let stored = CheckInRecord {
            id: state.check_ins.len() as i64 + 1,
            user_id: record.user_id,
            activity_id: record.activity_id,
            checkpoint_id: record.checkpoint_id,
            check_in_time: record.check_in_time,
            lat: record.lat,
            lng: record.lng,
            distance_to_checkpoint: record.distance_to_checkpoint,
            status: record.status,
            remark: record.remark,
        };
        state.check_ins.push(stored.clone());
        Ok(CheckInInsert::Inserted(stored))
    }

    async fn list_for_user(&self, user_id: i64, activity_id: i64) -> Result<Vec<CheckInRecord>> {
        let state = self.state.lock().unwrap();
        let mut list: Vec<_> = state
            .check_ins
            .iter()
            .filter(|r| r.user_id == user_id && r.activity_id == activity_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.check_in_time.cmp(&a.check_in_time));
        Ok(list)
    }

    async fn count_at_checkpoint(&self, activity_id: i64, checkpoint_id: i64) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .check_ins
            .iter()
            .filter(|r| r.activity_id == activity_id && r.checkpoint_id == checkpoint_id)
            .count() as i64)
    }
}

#[async_trait]
impl TrackStore for MemoryStore {
    async fn insert(&self, points: &[TrackPoint]) -> Result<()> {
        self.state.lock().unwrap().tracks.extend_from_slice(points);
        Ok(())
    }

    async fn recent_within(
        &self,
        user_id: i64,
        activity_id: i64,
        since: NaiveDateTime,
    ) -> Result<Vec<TrackPoint>> {
        let state = self.state.lock().unwrap();
        let mut list: Vec<_> = state
            .tracks
            .iter()
            .filter(|p| p.user_id == user_id && p.activity_id == activity_id && p.record_time >= since)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.record_time.cmp(&a.record_time));
        Ok(list)
    }

    async fn latest(&self, user_id: i64, activity_id: i64) -> Result<Option<TrackPoint>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tracks
            .iter()
            .filter(|p| p.user_id == user_id && p.activity_id == activity_id)
            .max_by_key(|p| p.record_time)
            .cloned())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn find_open(
        &self,
        user_id: i64,
        activity_id: i64,
        alert_type: AlertType,
    ) -> Result<Option<AlertEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .alerts
            .iter()
            .find(|a| {
                a.user_id == user_id
                    && a.activity_id == activity_id
                    && a.alert_type == alert_type
                    && a.handle_status.is_open()
            })
            .cloned())
    }

    async fn insert_if_absent(&self, event: AlertEvent) -> Result<Option<AlertEvent>> {
        let mut state = self.state.lock().unwrap();
        let open = state.alerts.iter().any(|a| {
            a.user_id == event.user_id
                && a.activity_id == event.activity_id
                && a.alert_type == event.alert_type
                && a.handle_status.is_open()
        });
        if open {
            return Ok(None);
        }
        state.alerts.push(event.clone());
        Ok(Some(event))
    }

    async fn get(&self, alert_id: Uuid) -> Result<Option<AlertEvent>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .alerts
            .iter()
            .find(|a| a.id == alert_id)
            .cloned())
    }

    async fn update_handle(
        &self,
        alert_id: Uuid,
        status: HandleStatus,
        operator_id: i64,
        remark: Option<String>,
        handled_at: NaiveDateTime,
    ) -> Result<Option<AlertEvent>> {
        let mut state = self.state.lock().unwrap();
        let alert = match state
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.handle_status.is_open())
        {
            Some(a) => a,
            None => return Ok(None),
        };
        alert.handle_status = status;
        alert.handle_by = Some(operator_id);
        alert.handle_time = Some(handled_at);
        alert.handle_remark = remark;
        Ok(Some(alert.clone()))
    }

    async fn list(&self, query: &AlertQuery) -> Result<Page<AlertEvent>> {
        let state = self.state.lock().unwrap();
        let mut matched: Vec<_> = state
            .alerts
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.trigger_time.cmp(&a.trigger_time));
        let total = matched.len() as i64;
        let items = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size() as usize)
            .collect();
        Ok(Page {
            items,
            total,
            page_num: query.page_num(),
            page_size: query.page_size(),
        })
    }

    async fn count_pending(&self, activity_id: i64) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .alerts
            .iter()
            .filter(|a| a.activity_id == activity_id && a.handle_status == HandleStatus::Pending)
            .count() as i64)
    }

    async fn summarize(&self, activity_id: i64) -> Result<Vec<AlertSummaryRow>> {
        let state = self.state.lock().unwrap();
        let mut groups: HashMap<_, i64> = HashMap::new();
        for a in state.alerts.iter().filter(|a| a.activity_id == activity_id) {
            *groups
                .entry((a.alert_type, a.alert_level, a.handle_status))
                .or_default() += 1;
        }
        Ok(groups
            .into_iter()
            .map(|((alert_type, alert_level, handle_status), count)| AlertSummaryRow {
                alert_type,
                alert_level,
                handle_status,
                count,
            })
            .collect())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_raw(&self, group: &str, key: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        if state.config_down {
            bail!("config store unavailable");
        }
        Ok(state
            .config
            .get(&(group.to_string(), key.to_string()))
            .cloned())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn is_admin(&self, user_id: i64) -> Result<bool> {
        Ok(self.state.lock().unwrap().admins.contains(&user_id))
    }

    async fn nickname(&self, user_id: i64) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().nicknames.get(&user_id).cloned())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn notify_organizer(&self, activity_id: i64, title: &str, body: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.notify_down {
            bail!("inbox unavailable");
        }
        state
            .notices
            .push((activity_id, title.to_string(), body.to_string()));
        Ok(())
    }
}
