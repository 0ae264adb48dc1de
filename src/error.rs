use thiserror::Error;

/// Failures surfaced by the check-in, ingestion and alert-handling operations.
#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("user is not an approved participant of this activity")]
    NotRegistered,

    #[error("activity not found")]
    ActivityNotFound,

    #[error("activity has not started yet")]
    ActivityNotStarted,

    #[error("activity has already ended")]
    ActivityEnded,

    #[error("checkpoint not found on this activity's route")]
    CheckpointNotFound,

    #[error("not within check-in range ({distance:.0} m away, radius {radius} m)")]
    NotInRange { distance: f64, radius: i32 },

    #[error("already checked in at this checkpoint")]
    DuplicateCheckIn,

    #[error("alert not found")]
    NotFound,

    #[error("only the activity organizer or an administrator may do this")]
    Forbidden,

    #[error("alert is already closed")]
    AlertClosed,

    #[error("alert configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type SafetyResult<T> = Result<T, SafetyError>;
