use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::SafetyError;
use crate::store::ConfigStore;

/// Tunable detection thresholds stored in the `alert_config` dictionary group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdKey {
    Deviation,
    SevereDeviation,
    StationaryMinutes,
    CheckinTimeoutMinutes,
    LostContactMinutes,
    ScanIntervalMinutes,
    StationaryDistance,
}

impl ThresholdKey {
    pub fn key(&self) -> &'static str {
        match self {
            ThresholdKey::Deviation => "deviation_threshold",
            ThresholdKey::SevereDeviation => "severe_deviation_threshold",
            ThresholdKey::StationaryMinutes => "stationary_threshold",
            ThresholdKey::CheckinTimeoutMinutes => "checkin_timeout",
            ThresholdKey::LostContactMinutes => "lost_contact_threshold",
            ThresholdKey::ScanIntervalMinutes => "check_interval",
            ThresholdKey::StationaryDistance => "stationary_distance_threshold",
        }
    }

    pub fn default_value(&self) -> f64 {
        match self {
            ThresholdKey::Deviation => 200.0,
            ThresholdKey::SevereDeviation => 500.0,
            ThresholdKey::StationaryMinutes => 30.0,
            ThresholdKey::CheckinTimeoutMinutes => 20.0,
            ThresholdKey::LostContactMinutes => 60.0,
            ThresholdKey::ScanIntervalMinutes => 5.0,
            ThresholdKey::StationaryDistance => 50.0,
        }
    }

    /// Largest accepted value; anything above falls back to the default.
    pub fn max_value(&self) -> f64 {
        match self {
            ThresholdKey::Deviation
            | ThresholdKey::SevereDeviation
            | ThresholdKey::StationaryDistance => MAX_DISTANCE_METERS,
            ThresholdKey::StationaryMinutes
            | ThresholdKey::CheckinTimeoutMinutes
            | ThresholdKey::LostContactMinutes
            | ThresholdKey::ScanIntervalMinutes => MAX_MINUTES,
        }
    }
}

/// One week.
pub const MAX_MINUTES: f64 = 7.0 * 24.0 * 60.0;
pub const MAX_DISTANCE_METERS: f64 = 100_000.0;

/// One resolved set of thresholds, taken at the start of a detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub deviation_meters: f64,
    pub severe_deviation_meters: f64,
    pub stationary_minutes: i64,
    pub checkin_timeout_minutes: i64,
    pub lost_contact_minutes: i64,
    pub scan_interval_minutes: i64,
    pub stationary_distance_meters: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            deviation_meters: ThresholdKey::Deviation.default_value(),
            severe_deviation_meters: ThresholdKey::SevereDeviation.default_value(),
            stationary_minutes: ThresholdKey::StationaryMinutes.default_value() as i64,
            checkin_timeout_minutes: ThresholdKey::CheckinTimeoutMinutes.default_value() as i64,
            lost_contact_minutes: ThresholdKey::LostContactMinutes.default_value() as i64,
            scan_interval_minutes: ThresholdKey::ScanIntervalMinutes.default_value() as i64,
            stationary_distance_meters: ThresholdKey::StationaryDistance.default_value(),
        }
    }
}

#[derive(Clone)]
pub struct ConfigProvider {
    store: Arc<dyn ConfigStore>,
    group: String,
}

impl ConfigProvider {
    pub fn new(store: Arc<dyn ConfigStore>, group: impl Into<String>) -> Self {
        Self {
            store,
            group: group.into(),
        }
    }

    /// Resolves one threshold, substituting the compiled-in default on any failure.
    pub async fn get(&self, key: ThresholdKey) -> f64 {
        match self.lookup(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("No '{}' in config group '{}', using default", key.key(), self.group);
                key.default_value()
            }
            Err(e) => {
                warn!("{}; using default {} for '{}'", e, key.default_value(), key.key());
                key.default_value()
            }
        }
    }

    pub async fn thresholds(&self) -> Thresholds {
        Thresholds {
            deviation_meters: self.get(ThresholdKey::Deviation).await,
            severe_deviation_meters: self.get(ThresholdKey::SevereDeviation).await,
            stationary_minutes: self.get(ThresholdKey::StationaryMinutes).await as i64,
            checkin_timeout_minutes: self.get(ThresholdKey::CheckinTimeoutMinutes).await as i64,
            lost_contact_minutes: self.get(ThresholdKey::LostContactMinutes).await as i64,
            scan_interval_minutes: self.get(ThresholdKey::ScanIntervalMinutes).await as i64,
            stationary_distance_meters: self.get(ThresholdKey::StationaryDistance).await,
        }
    }

    async fn lookup(&self, key: ThresholdKey) -> Result<Option<f64>, SafetyError> {
        let raw = self
            .store
            .get_raw(&self.group, key.key())
            .await
            .map_err(|e| SafetyError::ConfigUnavailable(e.to_string()))?;
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && (0.0..=key.max_value()).contains(&v) => Ok(Some(v)),
            Ok(_) => Err(SafetyError::ConfigUnavailable(format!(
                "value '{}' for '{}' is outside 0..={}",
                raw.trim(),
                key.key(),
                key.max_value()
            ))),
            Err(_) => Err(SafetyError::ConfigUnavailable(format!(
                "unparseable value '{}' for '{}'",
                raw,
                key.key()
            ))),
        }
    }
}
