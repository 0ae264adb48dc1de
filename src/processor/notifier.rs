use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::models::AlertEvent;
use crate::store::{ActivityStore, NotificationSink, UserDirectory};

/// Emitted once per newly persisted alert.
#[derive(Debug, Clone)]
pub struct AlertRaised {
    pub alert: AlertEvent,
}

/// Publishing half of the organizer-notification queue.
///
/// Publishing never waits: a full or closed queue drops the notice with a
/// warning, and the persisted alert is unaffected either way.
#[derive(Clone)]
pub struct AlertNotifier {
    tx: mpsc::Sender<AlertRaised>,
}

impl AlertNotifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertRaised>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn publish(&self, alert: &AlertEvent) {
        match self.tx.try_send(AlertRaised {
            alert: alert.clone(),
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    "Notification queue full, dropping notice for alert {}",
                    event.alert.id
                );
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    "Notification queue closed, dropping notice for alert {}",
                    event.alert.id
                );
            }
        }
    }
}

/// Drains the notification queue into the organizer inbox.
pub struct NotificationDispatcher {
    activities: Arc<dyn ActivityStore>,
    users: Arc<dyn UserDirectory>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationDispatcher {
    pub fn new(
        activities: Arc<dyn ActivityStore>,
        users: Arc<dyn UserDirectory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            activities,
            users,
            sink,
        }
    }

    pub fn spawn(self, rx: mpsc::Receiver<AlertRaised>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Runs until every [`AlertNotifier`] has been dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<AlertRaised>) {
        while let Some(event) = rx.recv().await {
            if let Err(e) = self.deliver(&event.alert).await {
                error!("Failed to notify organizer about alert {}: {}", event.alert.id, e);
            }
        }
        debug!("Notification queue closed, dispatcher exiting");
    }

    pub async fn deliver(&self, alert: &AlertEvent) -> anyhow::Result<()> {
        let activity = match self.activities.get(alert.activity_id).await? {
            Some(a) => a,
            None => {
                warn!("Activity {} vanished before alert notice", alert.activity_id);
                return Ok(());
            }
        };
        let nickname = self
            .users
            .nickname(alert.user_id)
            .await?
            .unwrap_or_else(|| "Unknown user".to_string());
        let (title, body) = render_notice(alert, &activity.title, &nickname);
        self.sink
            .notify_organizer(alert.activity_id, &title, &body)
            .await
    }
}

pub fn render_notice(alert: &AlertEvent, activity_title: &str, nickname: &str) -> (String, String) {
    let title = format!("[{}] {}", alert.alert_level.label(), alert.alert_type.label());
    let body = format!(
        "In activity {}, participant {}: {}",
        activity_title, nickname, alert.description
    );
    (title, body)
}
