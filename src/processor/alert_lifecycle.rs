use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::authorize_supervisor;
use crate::clock::Clock;
use crate::error::{SafetyError, SafetyResult};
use crate::models::{
    AlertEvent, AlertListItem, AlertQuery, AlertStats, HandleAction, HandleStatus, Page,
};
use crate::store::Stores;

/// Query, statistics and handling of raised alerts.
#[derive(Clone)]
pub struct AlertLifecycle {
    stores: Stores,
    clock: Arc<dyn Clock>,
}

impl AlertLifecycle {
    pub fn new(stores: Stores, clock: Arc<dyn Clock>) -> Self {
        Self { stores, clock }
    }

    pub async fn list_for_activity(
        &self,
        activity_id: i64,
        query: AlertQuery,
    ) -> SafetyResult<Page<AlertListItem>> {
        let query = AlertQuery {
            activity_id: Some(activity_id),
            ..query
        };
        self.list_all(query).await
    }

    /// Lists across every activity unless the query names one.
    pub async fn list_all(&self, query: AlertQuery) -> SafetyResult<Page<AlertListItem>> {
        let page = self.stores.alerts.list(&query).await?;
        let mut titles: HashMap<i64, Option<String>> = HashMap::new();
        let mut nicknames: HashMap<i64, Option<String>> = HashMap::new();

        let mut items = Vec::with_capacity(page.items.len());
        for alert in page.items {
            let mut item = AlertListItem::new(alert);
            let activity_id = item.alert.activity_id;
            if !titles.contains_key(&activity_id) {
                let title = self
                    .stores
                    .activities
                    .get(activity_id)
                    .await?
                    .map(|a| a.title);
                titles.insert(activity_id, title);
            }
            item.activity_title = titles.get(&activity_id).cloned().flatten();
            item.user_nickname = self.nickname(&mut nicknames, item.alert.user_id).await?;
            if let Some(handler) = item.alert.handle_by {
                item.handler_nickname = self.nickname(&mut nicknames, handler).await?;
            }
            items.push(item);
        }
        Ok(Page {
            items,
            total: page.total,
            page_num: page.page_num,
            page_size: page.page_size,
        })
    }

    async fn nickname(
        &self,
        cache: &mut HashMap<i64, Option<String>>,
        user_id: i64,
    ) -> SafetyResult<Option<String>> {
        if let Some(known) = cache.get(&user_id) {
            return Ok(known.clone());
        }
        let nickname = self.stores.users.nickname(user_id).await?;
        cache.insert(user_id, nickname.clone());
        Ok(nickname)
    }

    pub async fn stats(&self, activity_id: i64) -> SafetyResult<AlertStats> {
        let rows = self.stores.alerts.summarize(activity_id).await?;
        Ok(AlertStats::from_summary(&rows))
    }

    pub async fn pending_count(&self, activity_id: i64) -> SafetyResult<i64> {
        Ok(self.stores.alerts.count_pending(activity_id).await?)
    }

    /// Moves an open alert to `action`'s status on behalf of the organizer or an admin.
    ///
    /// Resolved and Ignored are terminal: handling such an alert again fails
    /// with [`SafetyError::AlertClosed`].
    pub async fn handle(
        &self,
        operator_id: i64,
        alert_id: Uuid,
        action: HandleAction,
        remark: Option<String>,
    ) -> SafetyResult<AlertEvent> {
        let alert = self
            .stores
            .alerts
            .get(alert_id)
            .await?
            .ok_or(SafetyError::NotFound)?;
        let activity = self
            .stores
            .activities
            .get(alert.activity_id)
            .await?
            .ok_or(SafetyError::ActivityNotFound)?;
        authorize_supervisor(&self.stores, operator_id, &activity).await?;

        let status = HandleStatus::from(action);
        let updated = self
            .stores
            .alerts
            .update_handle(alert_id, status, operator_id, remark, self.clock.now())
            .await?
            .ok_or(SafetyError::AlertClosed)?;
        info!(
            "Alert {} moved from {:?} to {:?} by user {}",
            alert_id, alert.handle_status, updated.handle_status, operator_id
        );
        Ok(updated)
    }
}
