pub mod alert_detector;
pub mod alert_lifecycle;
pub mod checkin;
pub mod config_provider;
pub mod message_processor;
pub mod notifier;
pub mod track_ingestor;

#[cfg(test)]
pub(crate) mod testing;

pub use alert_detector::{AlertDetector, ScanReport};
pub use alert_lifecycle::AlertLifecycle;
pub use checkin::CheckInValidator;
pub use config_provider::{ConfigProvider, ThresholdKey, Thresholds};
pub use notifier::{AlertNotifier, AlertRaised, NotificationDispatcher};
pub use track_ingestor::TrackIngestor;

use crate::error::{SafetyError, SafetyResult};
use crate::models::ActivitySnapshot;
use crate::store::Stores;

/// Supervisory operations are limited to the activity's organizer and platform admins.
pub(crate) async fn authorize_supervisor(
    stores: &Stores,
    operator_id: i64,
    activity: &ActivitySnapshot,
) -> SafetyResult<()> {
    if operator_id == activity.organizer_id || stores.users.is_admin(operator_id).await? {
        Ok(())
    } else {
        Err(SafetyError::Forbidden)
    }
}
