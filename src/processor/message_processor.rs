use prost::Message as _;
use tracing::{info, warn};

use super::track_ingestor::TrackIngestor;
use crate::config::PayloadFormat;
use crate::error::SafetyError;
use crate::models::message::{TrackBatch, TrackBatchProto, TrackUploadMessage};

/// Decodes one Kafka payload into a track batch. Returns `None` for undecodable payloads.
pub fn decode_payload(format: PayloadFormat, payload: &[u8]) -> Option<TrackBatch> {
    match format {
        PayloadFormat::Json => match serde_json::from_slice::<TrackUploadMessage>(payload) {
            Ok(m) => Some(m.into_batch()),
            Err(e) => {
                warn!("Failed to parse track upload: {}", e);
                None
            }
        },
        PayloadFormat::Protobuf => match TrackBatchProto::decode(payload) {
            Ok(m) => Some(m.into_batch()),
            Err(e) => {
                warn!("Failed to decode protobuf track upload: {}", e);
                None
            }
        },
    }
}

/// Handles one track-upload message. Bad payloads and rejected uploads are
/// logged and skipped; only storage failures are returned.
pub async fn process_message(
    ingestor: &TrackIngestor,
    format: PayloadFormat,
    payload: &[u8],
) -> anyhow::Result<()> {
    let batch = match decode_payload(format, payload) {
        Some(b) => b,
        None => return Ok(()),
    };
    info!(
        "Processing track upload {} for user {} in activity {} ({} points)",
        batch.uuid.as_deref().unwrap_or("-"),
        batch.user_id,
        batch.activity_id,
        batch.samples.len()
    );

    match ingestor
        .ingest(batch.user_id, batch.activity_id, &batch.samples)
        .await
    {
        Ok(_) => Ok(()),
        Err(SafetyError::Storage(e)) => Err(e),
        Err(e) => {
            warn!(
                "Track upload for user {} in activity {} rejected: {}",
                batch.user_id, batch.activity_id, e
            );
            Ok(())
        }
    }
}
