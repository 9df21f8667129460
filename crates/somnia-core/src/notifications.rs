//! Persisted notification inbox.
//!
//! Alarm notices, sleep reminders and journal messages land here so a front
//! end can show them later. Stored newest first under `notifications`,
//! keeping at most [`MAX_NOTIFICATIONS`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alarm::Notice;
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::storage::{keys, load_json, save_json, KeyValueStore};

/// Older notifications beyond this are dropped on push.
pub const MAX_NOTIFICATIONS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Alarm,
    Sleep,
    Journal,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

pub struct NotificationCenter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter").finish_non_exhaustive()
    }
}

impl NotificationCenter {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn list(&self) -> Result<Vec<Notification>> {
        Ok(load_json(self.store.as_ref(), keys::NOTIFICATIONS)?.unwrap_or_default())
    }

    pub fn unread_count(&self) -> Result<usize> {
        Ok(self.list()?.iter().filter(|n| !n.read).count())
    }

    pub fn push(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Notification> {
        let mut all = self.list()?;
        let now = self.clock.now();
        let newest = all
            .iter()
            .filter_map(|n| n.id.parse::<i64>().ok())
            .max()
            .unwrap_or(i64::MIN);
        let notification = Notification {
            id: now.timestamp_millis().max(newest.saturating_add(1)).to_string(),
            kind,
            title: title.into(),
            body: body.into(),
            created_at: now,
            read: false,
        };
        all.insert(0, notification.clone());
        all.truncate(MAX_NOTIFICATIONS);
        self.save(&all)?;
        debug!(id = %notification.id, ?kind, "notification added");
        Ok(notification)
    }

    /// Record an alarm notice.
    pub fn push_notice(&self, notice: &Notice) -> Result<Notification> {
        self.push(NotificationKind::Alarm, &notice.title, &notice.body)
    }

    pub fn mark_read(&self, id: &str) -> Result<()> {
        let mut all = self.list()?;
        let notification = all
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| CoreError::NotificationNotFound(id.to_string()))?;
        notification.read = true;
        self.save(&all)
    }

    /// Returns how many were newly marked.
    pub fn mark_all_read(&self) -> Result<usize> {
        let mut all = self.list()?;
        let mut changed = 0;
        for n in all.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        self.save(&all)?;
        Ok(changed)
    }

    /// Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.list()?.len();
        self.save(&[])?;
        Ok(removed)
    }

    fn save(&self, all: &[Notification]) -> Result<()> {
        save_json(self.store.as_ref(), keys::NOTIFICATIONS, all)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn center() -> NotificationCenter {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 14, 7, 0, 0).unwrap());
        NotificationCenter::new(Arc::new(MemoryStore::new()), Arc::new(clock))
    }

    #[test]
    fn newest_first_with_unique_ids() {
        let center = center();
        let a = center.push(NotificationKind::Sleep, "Bedtime", "Time to wind down").unwrap();
        let b = center.push(NotificationKind::System, "Hello", "Welcome").unwrap();
        assert_ne!(a.id, b.id);

        let ids: Vec<_> = center.list().unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
        assert_eq!(center.unread_count().unwrap(), 2);
    }

    #[test]
    fn read_tracking() {
        let center = center();
        let a = center.push(NotificationKind::Journal, "Saved", "Entry saved").unwrap();
        center.push(NotificationKind::Journal, "Saved", "Entry saved").unwrap();

        center.mark_read(&a.id).unwrap();
        assert_eq!(center.unread_count().unwrap(), 1);
        assert_eq!(center.mark_all_read().unwrap(), 1);
        assert_eq!(center.unread_count().unwrap(), 0);
        assert!(center.mark_read("missing").is_err());
    }

    #[test]
    fn alarm_notice_is_recorded() {
        let center = center();
        let notice = Notice {
            title: "Alarm".into(),
            body: "Could not play alarm sound".into(),
        };
        let n = center.push_notice(&notice).unwrap();
        assert_eq!(n.kind, NotificationKind::Alarm);
        assert_eq!(center.clear().unwrap(), 1);
        assert!(center.list().unwrap().is_empty());
    }

    #[test]
    fn inbox_keeps_only_the_newest() {
        let center = center();
        let first = center.push(NotificationKind::System, "first", "oldest").unwrap();
        for i in 0..MAX_NOTIFICATIONS {
            center
                .push(NotificationKind::Alarm, "Alarm", format!("notice {i}"))
                .unwrap();
        }

        let all = center.list().unwrap();
        assert_eq!(all.len(), MAX_NOTIFICATIONS);
        assert!(all.iter().all(|n| n.id != first.id));
        assert_eq!(all[0].body, format!("notice {}", MAX_NOTIFICATIONS - 1));
    }
}
