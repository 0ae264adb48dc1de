use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use super::authorize_supervisor;
use crate::clock::Clock;
use crate::error::{SafetyError, SafetyResult};
use crate::geo;
use crate::models::{
    ActivitySnapshot, ActivityStatus, CheckInProgress, CheckInRecord, CheckInStatus, Checkpoint,
    CheckpointProgress, CheckpointStats, NewCheckIn, ParticipantProgress,
};
use crate::store::{CheckInInsert, Stores};

/// Grace period after a checkpoint's expected arrival before a check-in counts as late.
pub const LATE_TOLERANCE_MINUTES: i64 = 10;

#[derive(Clone)]
pub struct CheckInValidator {
    stores: Stores,
    clock: Arc<dyn Clock>,
}

impl CheckInValidator {
    pub fn new(stores: Stores, clock: Arc<dyn Clock>) -> Self {
        Self { stores, clock }
    }

    /// Validates a participant's position against a checkpoint geofence and records the check-in.
    pub async fn perform_check_in(
        &self,
        user_id: i64,
        activity_id: i64,
        checkpoint_id: i64,
        lat: f64,
        lng: f64,
        remark: Option<String>,
    ) -> SafetyResult<CheckInRecord> {
        info!(
            "Check-in request: user {} activity {} checkpoint {}",
            user_id, activity_id, checkpoint_id
        );
        if !self
            .stores
            .registrations
            .is_approved(user_id, activity_id)
            .await?
        {
            return Err(SafetyError::NotRegistered);
        }

        let now = self.clock.now();
        let activity = self.load_activity(activity_id).await?;
        if activity.status == ActivityStatus::Ended {
            return Err(SafetyError::ActivityEnded);
        }
        if !activity.is_ongoing() {
            if now < activity.starts_at() {
                return Err(SafetyError::ActivityNotStarted);
            }
            if now > activity.ends_at() {
                return Err(SafetyError::ActivityEnded);
            }
        }

        let checkpoint = match self.stores.routes.checkpoint(checkpoint_id).await? {
            Some(c) if Some(c.route_id) == activity.route_id => c,
            _ => return Err(SafetyError::CheckpointNotFound),
        };

        let distance = geo::distance_meters(lat, lng, checkpoint.lat, checkpoint.lng);
        let radius = checkpoint.effective_radius();
        if distance > f64::from(radius) {
            info!(
                "User {} is {:.1} m from checkpoint '{}' (radius {} m)",
                user_id, distance, checkpoint.name, radius
            );
            return Err(SafetyError::NotInRange { distance, radius });
        }

        if self
            .stores
            .check_ins
            .exists(user_id, activity_id, checkpoint_id)
            .await?
        {
            return Err(SafetyError::DuplicateCheckIn);
        }

        let status = classify(&activity, &checkpoint, now);
        let record = NewCheckIn {
            user_id,
            activity_id,
            checkpoint_id,
            check_in_time: now,
            lat,
            lng,
            distance_to_checkpoint: distance.round() as i32,
            status,
            remark,
        };
        match self.stores.check_ins.insert(record).await? {
            CheckInInsert::Inserted(stored) => {
                info!(
                    "Check-in {} recorded for user {} at '{}' ({:?})",
                    stored.id, user_id, checkpoint.name, stored.status
                );
                Ok(stored)
            }
            CheckInInsert::Duplicate => Err(SafetyError::DuplicateCheckIn),
        }
    }

    /// The route's checkpoints in order.
    pub async fn checkpoints(&self, activity_id: i64) -> SafetyResult<Vec<Checkpoint>> {
        let activity = self.load_activity(activity_id).await?;
        match activity.route_id {
            Some(route_id) => Ok(self.stores.routes.checkpoints(route_id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Per-checkpoint check-in state of one participant.
    pub async fn progress(&self, user_id: i64, activity_id: i64) -> SafetyResult<CheckInProgress> {
        let checkpoints = self.checkpoints(activity_id).await?;
        self.build_progress(user_id, activity_id, &checkpoints).await
    }

    /// Progress of every approved participant, for the organizer's monitor.
    pub async fn participants_progress(
        &self,
        operator_id: i64,
        activity_id: i64,
    ) -> SafetyResult<Vec<ParticipantProgress>> {
        let activity = self.load_activity(activity_id).await?;
        authorize_supervisor(&self.stores, operator_id, &activity).await?;

        let checkpoints = match activity.route_id {
            Some(route_id) => self.stores.routes.checkpoints(route_id).await?,
            None => Vec::new(),
        };
        let users = self
            .stores
            .registrations
            .approved_users(activity_id)
            .await?;

        let mut participants = Vec::with_capacity(users.len());
        for user_id in users {
            let nickname = self.stores.users.nickname(user_id).await?;
            if nickname.is_none() {
                debug!("No nickname for participant {} in activity {}", user_id, activity_id);
            }
            participants.push(ParticipantProgress {
                user_id,
                nickname,
                progress: self.build_progress(user_id, activity_id, &checkpoints).await?,
            });
        }
        Ok(participants)
    }

    async fn build_progress(
        &self,
        user_id: i64,
        activity_id: i64,
        checkpoints: &[Checkpoint],
    ) -> SafetyResult<CheckInProgress> {
        let mut records: HashMap<i64, CheckInRecord> = self
            .stores
            .check_ins
            .list_for_user(user_id, activity_id)
            .await?
            .into_iter()
            .map(|r| (r.checkpoint_id, r))
            .collect();

        let entries: Vec<CheckpointProgress> = checkpoints
            .iter()
            .map(|c| CheckpointProgress {
                record: records.remove(&c.id),
                checkpoint_id: c.id,
                name: c.name.clone(),
                sequence: c.sequence,
                checkpoint_type: c.checkpoint_type,
                is_required: c.is_required,
            })
            .collect();
        let total = entries.len();
        let checked = entries.iter().filter(|e| e.record.is_some()).count();
        Ok(CheckInProgress {
            activity_id,
            user_id,
            total_checkpoints: total,
            checked_in_count: checked,
            progress: percent(checked as i64, total as i64),
            checkpoints: entries,
        })
    }

    /// Completion of every checkpoint across the approved participants.
    pub async fn checkpoint_stats(
        &self,
        operator_id: i64,
        activity_id: i64,
    ) -> SafetyResult<Vec<CheckpointStats>> {
        let activity = self.load_activity(activity_id).await?;
        authorize_supervisor(&self.stores, operator_id, &activity).await?;

        let checkpoints = match activity.route_id {
            Some(route_id) => self.stores.routes.checkpoints(route_id).await?,
            None => Vec::new(),
        };
        let total = self
            .stores
            .registrations
            .approved_users(activity_id)
            .await?
            .len() as i64;

        let mut stats = Vec::with_capacity(checkpoints.len());
        for checkpoint in checkpoints {
            let checked = if total == 0 {
                0
            } else {
                self.stores
                    .check_ins
                    .count_at_checkpoint(activity_id, checkpoint.id)
                    .await?
            };
            stats.push(CheckpointStats {
                checkpoint,
                checked_count: checked,
                total_count: total,
                completion_rate: percent(checked, total),
            });
        }
        Ok(stats)
    }

    async fn load_activity(&self, activity_id: i64) -> SafetyResult<ActivitySnapshot> {
        self.stores
            .activities
            .get(activity_id)
            .await?
            .ok_or(SafetyError::ActivityNotFound)
    }
}

fn classify(
    activity: &ActivitySnapshot,
    checkpoint: &Checkpoint,
    now: chrono::NaiveDateTime,
) -> CheckInStatus {
    match checkpoint.expected_arrival(activity.starts_at()) {
        Some(expected) if now > expected + Duration::minutes(LATE_TOLERANCE_MINUTES) => {
            CheckInStatus::Late
        }
        _ => CheckInStatus::Normal,
    }
}

fn percent(part: i64, total: i64) -> u32 {
    if total <= 0 {
        0
    } else {
        (part * 100 / total) as u32
    }
}
