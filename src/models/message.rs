use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use super::track::TrackSample;

/// Track upload as published on the Kafka topic (JSON encoding).
#[derive(Debug, Deserialize)]
pub struct TrackUploadMessage {
    #[serde(default)]
    pub uuid: Option<String>,
    pub user_id: i64,
    pub activity_id: i64,
    #[serde(default)]
    pub points: Vec<RawTrackPoint>,
}

#[derive(Debug, Deserialize)]
pub struct RawTrackPoint {
    #[serde(alias = "latitude", default, deserialize_with = "parse_f64_option")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude", default, deserialize_with = "parse_f64_option")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub elevation: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub accuracy: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    pub record_time: Option<String>,
}

/// Track upload in protobuf encoding. Record times are local wall-clock epoch milliseconds.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TrackBatchProto {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(int64, tag = "2")]
    pub user_id: i64,
    #[prost(int64, tag = "3")]
    pub activity_id: i64,
    #[prost(message, repeated, tag = "4")]
    pub points: Vec<TrackSampleProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TrackSampleProto {
    #[prost(double, tag = "1")]
    pub lat: f64,
    #[prost(double, tag = "2")]
    pub lng: f64,
    #[prost(int32, optional, tag = "3")]
    pub elevation: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub accuracy: Option<i32>,
    #[prost(double, optional, tag = "5")]
    pub speed: Option<f64>,
    #[prost(int64, tag = "6")]
    pub record_time_ms: i64,
}

/// A decoded upload batch, ready for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackBatch {
    pub uuid: Option<String>,
    pub user_id: i64,
    pub activity_id: i64,
    pub samples: Vec<TrackSample>,
}

impl TrackUploadMessage {
    pub fn into_batch(self) -> TrackBatch {
        let samples = self
            .points
            .into_iter()
            .filter_map(|p| p.into_sample())
            .collect();
        TrackBatch {
            uuid: self.uuid,
            user_id: self.user_id,
            activity_id: self.activity_id,
            samples,
        }
    }
}

impl RawTrackPoint {
    fn into_sample(self) -> Option<TrackSample> {
        let (lat, lng) = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => {
                warn!("Dropping track point without coordinates");
                return None;
            }
        };
        let raw_time = self.record_time.as_deref().unwrap_or("");
        let record_time = match parse_record_time(raw_time) {
            Some(t) => t,
            None => {
                warn!("Dropping track point with invalid record_time: '{}'", raw_time);
                return None;
            }
        };
        Some(TrackSample {
            lat,
            lng,
            elevation: self.elevation.map(|v| v.round() as i32),
            accuracy: self.accuracy.map(|v| v.round() as i32),
            speed: self.speed,
            record_time,
        })
    }
}

impl TrackBatchProto {
    pub fn into_batch(self) -> TrackBatch {
        let samples = self
            .points
            .into_iter()
            .filter_map(|p| {
                let record_time = match DateTime::from_timestamp_millis(p.record_time_ms) {
                    Some(dt) => dt.naive_utc(),
                    None => {
                        warn!("Dropping track point with invalid record_time_ms: {}", p.record_time_ms);
                        return None;
                    }
                };
                Some(TrackSample {
                    lat: p.lat,
                    lng: p.lng,
                    elevation: p.elevation,
                    accuracy: p.accuracy,
                    speed: p.speed,
                    record_time,
                })
            })
            .collect();
        TrackBatch {
            uuid: if self.uuid.is_empty() { None } else { Some(self.uuid) },
            user_id: self.user_id,
            activity_id: self.activity_id,
            samples,
        }
    }
}

pub fn parse_record_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_parsing_mixed_payload() {
        let payload = r#"
        {
            "uuid": "d52b1454-d43d-50fa-99ca-79515c904162",
            "user_id": 7,
            "activity_id": 3,
            "points": [
                {
                    "lat": "+30.252494",
                    "lng": 120.151404,
                    "elevation": "812",
                    "accuracy": 8,
                    "speed": "",
                    "record_time": "2025-05-01 10:00:00"
                },
                {
                    "latitude": 30.2526,
                    "longitude": 120.1516,
                    "record_time": "2025-05-01T10:00:30"
                },
                {
                    "lat": 30.2527,
                    "record_time": "2025-05-01 10:01:00"
                },
                {
                    "lat": 30.2527,
                    "lng": 120.1517,
                    "record_time": "yesterday"
                }
            ]
        }
        "#;

        let msg: TrackUploadMessage = serde_json::from_str(payload).unwrap();
        let batch = msg.into_batch();
        assert_eq!(batch.user_id, 7);
        assert_eq!(batch.activity_id, 3);
        assert_eq!(batch.samples.len(), 2);
        assert_eq!(batch.samples[0].lat, 30.252494);
        assert_eq!(batch.samples[0].elevation, Some(812));
        assert_eq!(batch.samples[0].speed, None);
        assert_eq!(
            batch.samples[1].record_time,
            parse_record_time("2025-05-01 10:00:30").unwrap()
        );
    }

    #[test]
    fn test_decoding_protobuf_batch() {
        let record_time = parse_record_time("2025-05-01 10:00:00").unwrap();
        let proto = TrackBatchProto {
            uuid: String::new(),
            user_id: 11,
            activity_id: 4,
            points: vec![TrackSampleProto {
                lat: 30.25,
                lng: 120.15,
                elevation: None,
                accuracy: Some(5),
                speed: Some(1.5),
                record_time_ms: record_time.and_utc().timestamp_millis(),
            }],
        };
        let bytes = proto.encode_to_vec();

        let batch = TrackBatchProto::decode(bytes.as_slice()).unwrap().into_batch();
        assert_eq!(batch.uuid, None);
        assert_eq!(batch.user_id, 11);
        assert_eq!(batch.samples.len(), 1);
        assert_eq!(batch.samples[0].record_time, record_time);
        assert_eq!(batch.samples[0].accuracy, Some(5));
    }
}
