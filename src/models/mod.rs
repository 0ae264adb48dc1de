pub mod activity;
pub mod alert;
pub mod checkin;
pub mod message;
pub mod route;
pub mod track;

pub use activity::{ActivitySnapshot, ActivityStatus};
pub use alert::{
    AlertEvent, AlertLevel, AlertListItem, AlertQuery, AlertStats, AlertSummaryRow, AlertType, HandleAction,
    HandleStatus, NewAlert, Page, TypeCount,
};
pub use checkin::{
    CheckInProgress, CheckInRecord, CheckInStatus, CheckpointProgress, CheckpointStats, NewCheckIn,
    ParticipantProgress,
};
pub use route::{Checkpoint, CheckpointType, RoutePoint};
pub use track::{TrackPoint, TrackSample};
