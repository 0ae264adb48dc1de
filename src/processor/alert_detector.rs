//! Anomaly detection over live activities.
//!
//! Two entry points feed it: the real-time check run after every track upload
//! (route deviation, long stationary) and the scheduled scans over every
//! ongoing activity (overdue check-ins, lost contact). Every detection goes
//! through [`AlertDetector::raise_if_absent`], which relies on the alert
//! store's atomic insert so that at most one open alert exists per
//! (user, activity, type).

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::config_provider::{ConfigProvider, ThresholdKey, Thresholds};
use super::notifier::AlertNotifier;
use crate::clock::Clock;
use crate::error::SafetyResult;
use crate::geo;
use crate::models::{ActivitySnapshot, AlertEvent, AlertType, NewAlert, TrackSample};
use crate::store::Stores;

/// Outcome of one scheduled scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub activities: usize,
    pub raised: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct AlertDetector {
    stores: Stores,
    config: ConfigProvider,
    notifier: AlertNotifier,
    clock: Arc<dyn Clock>,
}

impl AlertDetector {
    pub fn new(
        stores: Stores,
        config: ConfigProvider,
        notifier: AlertNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stores,
            config,
            notifier,
            clock,
        }
    }

    /// Real-time checks for one freshly uploaded position.
    ///
    /// Does nothing unless the activity is ongoing and the user is an approved participant.
    pub async fn check_track_alerts(
        &self,
        user_id: i64,
        activity_id: i64,
        point: &TrackSample,
    ) -> SafetyResult<Vec<AlertEvent>> {
        let activity = match self.stores.activities.get(activity_id).await? {
            Some(a) if a.is_ongoing() => a,
            _ => return Ok(Vec::new()),
        };
        if !self
            .stores
            .registrations
            .is_approved(user_id, activity_id)
            .await?
        {
            return Ok(Vec::new());
        }

        let thresholds = self.config.thresholds().await;
        let mut raised = Vec::new();
        if let Some(alert) = self
            .check_route_deviation(user_id, &activity, point, &thresholds)
            .await?
        {
            raised.push(alert);
        }
        if let Some(alert) = self
            .check_long_stationary(user_id, &activity, point, &thresholds)
            .await?
        {
            raised.push(alert);
        }
        Ok(raised)
    }

    async fn check_route_deviation(
        &self,
        user_id: i64,
        activity: &ActivitySnapshot,
        point: &TrackSample,
        thresholds: &Thresholds,
    ) -> SafetyResult<Option<AlertEvent>> {
        let route_id = match activity.route_id {
            Some(id) => id,
            None => return Ok(None),
        };
        let route = self.stores.routes.route_points(route_id).await?;
        let min_distance = match geo::nearest_vertex_distance(
            point.lat,
            point.lng,
            route.iter().map(|p| (p.lat, p.lng)),
        ) {
            Some(d) => d,
            None => return Ok(None),
        };

        let alert_type = if min_distance > thresholds.severe_deviation_meters {
            AlertType::SevereDeviation
        } else if min_distance > thresholds.deviation_meters {
            AlertType::RouteDeviation
        } else {
            return Ok(None);
        };
        let description = deviation_description(min_distance, alert_type == AlertType::SevereDeviation);
        self.raise_if_absent(NewAlert {
            activity_id: activity.id,
            user_id,
            alert_type,
            description,
            lat: Some(point.lat),
            lng: Some(point.lng),
        })
        .await
    }

    async fn check_long_stationary(
        &self,
        user_id: i64,
        activity: &ActivitySnapshot,
        point: &TrackSample,
        thresholds: &Thresholds,
    ) -> SafetyResult<Option<AlertEvent>> {
        let since = minutes_before(
            self.clock.now(),
            thresholds.stationary_minutes,
            ThresholdKey::StationaryMinutes,
        );
        let recent = self
            .stores
            .tracks
            .recent_within(user_id, activity.id, since)
            .await?;
        // Newest first: the most recent sample is the reference position.
        let reference = match recent.first() {
            Some(p) => p,
            None => return Ok(None),
        };
        let stationary = recent.iter().all(|p| {
            geo::is_within_range(
                p.lat,
                p.lng,
                reference.lat,
                reference.lng,
                thresholds.stationary_distance_meters,
            )
        });
        if !stationary {
            return Ok(None);
        }
        self.raise_if_absent(NewAlert {
            activity_id: activity.id,
            user_id,
            alert_type: AlertType::LongStationary,
            description: stationary_description(thresholds.stationary_minutes),
            lat: Some(point.lat),
            lng: Some(point.lng),
        })
        .await
    }

    /// Scans every ongoing activity for participants who missed a checkpoint deadline.
    pub async fn check_timeout_alerts(&self) -> SafetyResult<ScanReport> {
        let activities = self.stores.activities.ongoing().await?;
        if activities.is_empty() {
            return Ok(ScanReport::default());
        }
        let thresholds = self.config.thresholds().await;
        let now = self.clock.now();
        let timeout = minutes_or_default(
            thresholds.checkin_timeout_minutes,
            ThresholdKey::CheckinTimeoutMinutes,
        );

        let results = join_all(
            activities
                .iter()
                .map(|activity| self.scan_activity_timeouts(activity, now, timeout)),
        )
        .await;
        Ok(fold_results("timeout", &activities, results))
    }

    async fn scan_activity_timeouts(
        &self,
        activity: &ActivitySnapshot,
        now: NaiveDateTime,
        timeout: Duration,
    ) -> SafetyResult<usize> {
        let route_id = match activity.route_id {
            Some(id) => id,
            None => return Ok(0),
        };
        let start = activity.starts_at();
        let overdue: Vec<_> = self
            .stores
            .routes
            .checkpoints(route_id)
            .await?
            .into_iter()
            .filter(|c| match c.expected_arrival(start) {
                Some(expected) => expected
                    .checked_add_signed(timeout)
                    .map_or(false, |deadline| now > deadline),
                None => false,
            })
            .collect();
        if overdue.is_empty() {
            return Ok(0);
        }

        let participants = self
            .stores
            .registrations
            .approved_users(activity.id)
            .await?;
        let mut raised = 0;
        for checkpoint in &overdue {
            for &user_id in &participants {
                if self
                    .stores
                    .check_ins
                    .exists(user_id, activity.id, checkpoint.id)
                    .await?
                {
                    continue;
                }
                let alert = self
                    .raise_if_absent(NewAlert {
                        activity_id: activity.id,
                        user_id,
                        alert_type: AlertType::TimeoutNoCheckin,
                        description: timeout_description(&checkpoint.name),
                        lat: Some(checkpoint.lat),
                        lng: Some(checkpoint.lng),
                    })
                    .await?;
                if alert.is_some() {
                    raised += 1;
                }
            }
        }
        Ok(raised)
    }

    /// Scans every ongoing activity for participants whose last track is too old.
    pub async fn check_lost_contact_alerts(&self) -> SafetyResult<ScanReport> {
        let activities = self.stores.activities.ongoing().await?;
        if activities.is_empty() {
            return Ok(ScanReport::default());
        }
        let thresholds = self.config.thresholds().await;
        let cutoff = minutes_before(
            self.clock.now(),
            thresholds.lost_contact_minutes,
            ThresholdKey::LostContactMinutes,
        );

        let results = join_all(activities.iter().map(|activity| {
            self.scan_activity_lost_contact(activity, cutoff, thresholds.lost_contact_minutes)
        }))
        .await;
        Ok(fold_results("lost-contact", &activities, results))
    }

    async fn scan_activity_lost_contact(
        &self,
        activity: &ActivitySnapshot,
        cutoff: NaiveDateTime,
        minutes: i64,
    ) -> SafetyResult<usize> {
        let mut raised = 0;
        for user_id in self
            .stores
            .registrations
            .approved_users(activity.id)
            .await?
        {
            let last = self.stores.tracks.latest(user_id, activity.id).await?;
            let silent = match last {
                Some(p) => p.record_time < cutoff,
                None => true,
            };
            if !silent {
                continue;
            }
            let alert = self
                .raise_if_absent(NewAlert {
                    activity_id: activity.id,
                    user_id,
                    alert_type: AlertType::LostContact,
                    description: lost_contact_description(minutes),
                    lat: None,
                    lng: None,
                })
                .await?;
            if alert.is_some() {
                raised += 1;
            }
        }
        Ok(raised)
    }

    /// Persists the alert unless an open one of the same kind already exists.
    ///
    /// Returns the new alert, or `None` when deduplicated. The organizer notice is
    /// queued only after the row is stored.
    pub async fn raise_if_absent(&self, alert: NewAlert) -> SafetyResult<Option<AlertEvent>> {
        if self
            .stores
            .alerts
            .find_open(alert.user_id, alert.activity_id, alert.alert_type)
            .await?
            .is_some()
        {
            return Ok(None);
        }
        let created = self
            .stores
            .alerts
            .insert_if_absent(alert.into_event(self.clock.now()))
            .await?;
        if let Some(event) = &created {
            info!(
                "Raised {:?} alert {} for user {} in activity {}",
                event.alert_type, event.id, event.user_id, event.activity_id
            );
            self.notifier.publish(event);
        }
        Ok(created)
    }
}

/// `Duration` for a configured minute count, or the key's default when out of range.
fn minutes_or_default(minutes: i64, key: ThresholdKey) -> Duration {
    Duration::try_minutes(minutes).unwrap_or_else(|| {
        warn!(
            "{} of {} minutes is out of range, using default",
            key.key(),
            minutes
        );
        Duration::minutes(key.default_value() as i64)
    })
}

/// Start of a look-back window ending at `now`.
fn minutes_before(now: NaiveDateTime, minutes: i64, key: ThresholdKey) -> NaiveDateTime {
    now.checked_sub_signed(minutes_or_default(minutes, key))
        .or_else(|| {
            warn!(
                "{} window of {} minutes underflows, using default",
                key.key(),
                minutes
            );
            now.checked_sub_signed(Duration::minutes(key.default_value() as i64))
        })
        .unwrap_or(NaiveDateTime::MIN)
}

fn fold_results(
    scan: &str,
    activities: &[ActivitySnapshot],
    results: Vec<SafetyResult<usize>>,
) -> ScanReport {
    let mut report = ScanReport {
        activities: activities.len(),
        ..Default::default()
    };
    for (activity, result) in activities.iter().zip(results) {
        match result {
            Ok(n) => report.raised += n,
            Err(e) => {
                report.failed += 1;
                error!("{} scan failed for activity {}: {}", scan, activity.id, e);
            }
        }
    }
    debug!("{} scan finished: {:?}", scan, report);
    report
}

fn deviation_description(distance: f64, severe: bool) -> String {
    let level = if severe { "severely " } else { "" };
    format!(
        "user {}deviated from the route by about {} m",
        level,
        distance.round() as i64
    )
}

fn stationary_description(minutes: i64) -> String {
    format!("user has not moved for more than {} minutes", minutes)
}

fn timeout_description(checkpoint_name: &str) -> String {
    format!("user missed the check-in at [{}]", checkpoint_name)
}

fn lost_contact_description(minutes: i64) -> String {
    format!(
        "no track reported for more than {} minutes, possibly lost contact",
        minutes
    )
}
