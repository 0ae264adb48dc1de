use tracing::{error, info};

use super::alert_detector::AlertDetector;
use crate::error::{SafetyError, SafetyResult};
use crate::models::{TrackPoint, TrackSample};
use crate::store::Stores;

/// Persists uploaded GPS batches and runs the real-time checks on the newest sample.
#[derive(Clone)]
pub struct TrackIngestor {
    stores: Stores,
    detector: AlertDetector,
}

impl TrackIngestor {
    pub fn new(stores: Stores, detector: AlertDetector) -> Self {
        Self { stores, detector }
    }

    /// Stores every sample as-is and returns how many were written.
    ///
    /// Alert detection runs afterwards on the last sample of the batch; its
    /// failures are logged and never fail the upload.
    pub async fn ingest(
        &self,
        user_id: i64,
        activity_id: i64,
        samples: &[TrackSample],
    ) -> SafetyResult<usize> {
        let last = match samples.last() {
            Some(s) => s,
            None => {
                info!("Empty track batch from user {}, skipping", user_id);
                return Ok(0);
            }
        };
        if self.stores.activities.get(activity_id).await?.is_none() {
            return Err(SafetyError::ActivityNotFound);
        }

        let points: Vec<TrackPoint> = samples
            .iter()
            .cloned()
            .map(|s| s.into_point(user_id, activity_id))
            .collect();
        self.stores.tracks.insert(&points).await?;
        info!(
            "Stored {} track points for user {} in activity {}",
            points.len(),
            user_id,
            activity_id
        );

        if let Err(e) = self
            .detector
            .check_track_alerts(user_id, activity_id, last)
            .await
        {
            error!(
                "Track alert check failed for user {} in activity {}: {}",
                user_id, activity_id, e
            );
        }
        Ok(points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::meters_to_lat_degrees;
    use crate::models::AlertType;
    use crate::processor::testing::{at, sample, Harness, ROUTE_ID, START_LAT, START_LNG};

    #[tokio::test]
    async fn stationary_participant_alerted_once_across_uploads() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 08:00:00");
        h.store.approve(7, 1);
        let offsets = [0.0, 10.0, 25.0, 40.0, 15.0];
        let times = [
            "2025-05-01 08:00:00",
            "2025-05-01 08:09:00",
            "2025-05-01 08:18:00",
            "2025-05-01 08:27:00",
            "2025-05-01 08:35:00",
        ];

        for (offset, time) in offsets.iter().zip(times) {
            h.clock.set(at(time));
            let lat = START_LAT + meters_to_lat_degrees(*offset);
            h.ingestor
                .ingest(7, 1, &[sample(lat, START_LNG, time)])
                .await
                .unwrap();
        }

        let stationary: Vec<_> = h
            .store
            .alerts()
            .into_iter()
            .filter(|a| a.alert_type == AlertType::LongStationary)
            .collect();
        assert_eq!(stationary.len(), 1);
        assert_eq!(h.store.tracks().len(), 5);
    }

    #[tokio::test]
    async fn only_the_last_sample_is_checked() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 09:00:00");
        h.store.approve(7, 1);
        let far = START_LAT + meters_to_lat_degrees(2_000.0);
        let batch = [
            sample(far, START_LNG, "2025-05-01 08:50:00"),
            sample(START_LAT, START_LNG, "2025-05-01 08:59:00"),
        ];

        let stored = h.ingestor.ingest(7, 1, &batch).await.unwrap();

        assert_eq!(stored, 2);
        assert!(h.store.alerts().iter().all(|a| {
            a.alert_type != AlertType::SevereDeviation && a.alert_type != AlertType::RouteDeviation
        }));
    }

    #[tokio::test]
    async fn detector_failure_does_not_fail_upload() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 09:00:00");
        h.store.approve(7, 1);
        h.store.break_route(ROUTE_ID);

        let stored = h
            .ingestor
            .ingest(7, 1, &[sample(START_LAT, START_LNG, "2025-05-01 08:59:00")])
            .await
            .unwrap();

        assert_eq!(stored, 1);
        assert_eq!(h.store.tracks().len(), 1);
        assert!(h.store.alerts().is_empty());
    }

    #[tokio::test]
    async fn unknown_activity_and_empty_batches() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 09:00:00");
        assert_eq!(h.ingestor.ingest(7, 1, &[]).await.unwrap(), 0);

        let err = h
            .ingestor
            .ingest(7, 42, &[sample(START_LAT, START_LNG, "2025-05-01 08:59:00")])
            .await
            .unwrap_err();
        assert!(matches!(err, SafetyError::ActivityNotFound));
        assert!(h.store.tracks().is_empty());
    }

    #[tokio::test]
    async fn out_of_order_samples_are_kept() {
        let h = Harness::ongoing("2025-05-01 08:00:00", "2025-05-01 09:00:00");
        let batch = [
            sample(START_LAT, START_LNG, "2025-05-01 08:58:00"),
            sample(START_LAT, START_LNG, "2025-05-01 08:40:00"),
            sample(START_LAT, START_LNG, "2025-05-01 08:40:00"),
        ];
        h.ingestor.ingest(9, 1, &batch).await.unwrap();
        assert_eq!(h.store.tracks().len(), 3);
    }
}
