//! "Take the second photo" reminder.
//!
//! Only one reminder is ever pending: scheduling cancels everything first.
//! [`StoredReminders`] keeps them in the [`LocalStore`] so the CLI can list
//! due reminders on a later run.

use crate::config::ReminderConfig;
use crate::platform::{NoticeKind, Notices};
use crate::store::{LocalStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const REMINDER_TITLE: &str = "📸 Time to take the second photo!";
pub const REMINDER_BODY: &str = "Don't forget to take a photo from another angle";

const REMINDERS_KEY: &str = "scheduled_reminders";

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("stored reminders unreadable: {0}")]
    Json(#[from] serde_json::Error),
    #[error("notifications not permitted")]
    NotPermitted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

impl Reminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.fire_at <= now
    }
}

#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    async fn cancel_all(&self) -> Result<(), ReminderError>;
    /// Schedule a local notification; returns its id.
    async fn schedule(
        &self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<String, ReminderError>;
    async fn pending(&self) -> Result<Vec<Reminder>, ReminderError>;
}

/// Replace any pending reminder with a fresh one `config.delay_secs` from
/// `now`. Failures become an error toast and `None`.
pub async fn schedule_reminder(
    scheduler: &dyn ReminderScheduler,
    notices: &dyn Notices,
    config: &ReminderConfig,
    now: DateTime<Utc>,
) -> Option<String> {
    if !config.enabled {
        return None;
    }
    let fire_at = now + Duration::seconds(config.delay_secs as i64);
    let result = async {
        scheduler.cancel_all().await?;
        scheduler.schedule(REMINDER_TITLE, REMINDER_BODY, fire_at).await
    }
    .await;

    match result {
        Ok(id) => {
            tracing::info!(%id, %fire_at, "reminder scheduled");
            Some(id)
        }
        Err(e) => {
            tracing::error!("failed to schedule reminder: {e}");
            notices.toast("Failed to set reminder", NoticeKind::Error);
            None
        }
    }
}

/// Reminders persisted as JSON under one store key.
pub struct StoredReminders {
    store: Arc<LocalStore>,
}

impl StoredReminders {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<Vec<Reminder>, ReminderError> {
        match self.store.get(REMINDERS_KEY) {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, reminders: &[Reminder]) -> Result<(), ReminderError> {
        if reminders.is_empty() {
            self.store.remove(REMINDERS_KEY)?;
        } else {
            self.store
                .set(REMINDERS_KEY, &serde_json::to_string(reminders)?)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReminderScheduler for StoredReminders {
    async fn cancel_all(&self) -> Result<(), ReminderError> {
        self.save(&[])
    }

    async fn schedule(
        &self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<String, ReminderError> {
        let mut reminders = self.load()?;
        let id = format!("{:016x}", rand::random::<u64>());
        reminders.push(Reminder {
            id: id.clone(),
            title: title.to_string(),
            body: body.to_string(),
            fire_at,
        });
        self.save(&reminders)?;
        Ok(id)
    }

    async fn pending(&self) -> Result<Vec<Reminder>, ReminderError> {
        self.load()
    }
}
