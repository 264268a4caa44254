//! Notification reconciler
//!
//! Merges server-persisted notifications with locally journaled reminders
//! into one feed per user: de-duplicated by namespaced id, newest first,
//! with an unread count. Also coordinates read-state changes across both
//! sources and keeps watchers' feeds fresh whenever the change signal fires.

use crate::database::{Notification, NotificationKind, Repository};
use crate::error::{AppError, Result};
use crate::services::signal::ChangeSignal;
use crate::storage::{LocalReminderEntry, ReminderJournal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Server-side notification storage as seen by the reconciler
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn notifications_for(&self, user_id: i64) -> Result<Vec<Notification>>;

    /// Mark one notification read. `NotFound` if it does not exist.
    async fn mark_read(&self, id: i64) -> Result<()>;

    /// Mark all of a user's notifications read. `NotFound` if there was
    /// nothing to update.
    async fn mark_all_read(&self, user_id: i64) -> Result<()>;
}

#[async_trait]
impl DurableStore for Repository {
    async fn notifications_for(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.list_notifications(user_id).await
    }

    async fn mark_read(&self, id: i64) -> Result<()> {
        if !self.mark_notification_read(id).await? {
            return Err(AppError::not_found("Notification", id));
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<()> {
        if !self.mark_all_notifications_read(user_id).await? {
            return Err(AppError::not_found("Notifications for user", user_id));
        }
        Ok(())
    }
}

/// Feed item identifier, namespaced by the source that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "lowercase")]
pub enum NotificationId {
    Server(i64),
    Local(Uuid),
}

/// One entry of the merged feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub id: NotificationId,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Originating schedule or medicine, for local reminders
    pub source_id: Option<i64>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for FeedItem {
    fn from(n: Notification) -> Self {
        Self {
            id: NotificationId::Server(n.id),
            user_id: n.user_id,
            title: n.title,
            message: n.message,
            kind: n.kind,
            source_id: None,
            read: n.read,
            created_at: n.created_at,
        }
    }
}

impl From<LocalReminderEntry> for FeedItem {
    fn from(e: LocalReminderEntry) -> Self {
        Self {
            id: NotificationId::Local(e.id),
            user_id: e.user_id,
            title: e.title,
            message: e.message,
            kind: e.kind.into(),
            source_id: Some(e.source_id),
            read: e.read,
            created_at: e.created_at,
        }
    }
}

/// Reconciled notification feed for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Feed {
    pub items: Vec<FeedItem>,
    pub unread_count: usize,
}

/// Merge both sources into a feed for `user_id`.
///
/// Entries of other users are dropped. When two entries share an id the
/// later one in the concatenation (durable, then local) replaces the
/// earlier one in place. The result is sorted by `created_at` descending;
/// the sort is stable, so ties keep concatenation order.
pub fn merge_feed(
    user_id: i64,
    durable: Vec<Notification>,
    local: Vec<LocalReminderEntry>,
) -> Feed {
    let mut items: Vec<FeedItem> = Vec::with_capacity(durable.len() + local.len());
    let mut positions: HashMap<NotificationId, usize> = HashMap::new();

    let combined = durable
        .into_iter()
        .map(FeedItem::from)
        .chain(local.into_iter().map(FeedItem::from))
        .filter(|item| item.user_id == user_id);

    for item in combined {
        match positions.get(&item.id) {
            Some(&pos) => items[pos] = item,
            None => {
                positions.insert(item.id, items.len());
                items.push(item);
            }
        }
    }

    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let unread_count = items.iter().filter(|item| !item.read).count();

    Feed {
        items,
        unread_count,
    }
}

/// Result of one side of a dual-source update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SourceOutcome {
    Ok,
    Failed(String),
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceOutcome::Ok)
    }

    fn from_result<T>(source: &str, result: Result<T>) -> Self {
        match result {
            Ok(_) => SourceOutcome::Ok,
            Err(e) => {
                tracing::warn!("Mark-all-read failed on {} notifications: {}", source, e);
                SourceOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Per-source outcome of marking everything read. Neither side is rolled
/// back or retried when the other fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkAllReadOutcome {
    pub durable: SourceOutcome,
    pub local: SourceOutcome,
}

impl MarkAllReadOutcome {
    pub fn is_complete(&self) -> bool {
        self.durable.is_ok() && self.local.is_ok()
    }
}

/// Builds feeds from the durable store and the local journal
#[derive(Clone)]
pub struct NotificationReconciler {
    store: Arc<dyn DurableStore>,
    journal: Arc<dyn ReminderJournal>,
    signal: ChangeSignal,
}

impl NotificationReconciler {
    pub fn new(
        store: Arc<dyn DurableStore>,
        journal: Arc<dyn ReminderJournal>,
        signal: ChangeSignal,
    ) -> Self {
        Self {
            store,
            journal,
            signal,
        }
    }

    /// Fetch both sources and merge them. A durable-store failure fails the
    /// whole call; the journal degrades to empty on its own.
    pub async fn get_feed(&self, user_id: i64) -> Result<Feed> {
        let durable = self.store.notifications_for(user_id).await?;
        let local = self.journal.load().await;

        let feed = merge_feed(user_id, durable, local);
        tracing::debug!(
            "Feed for user {}: {} items, {} unread",
            user_id,
            feed.items.len(),
            feed.unread_count
        );
        Ok(feed)
    }

    /// Mark a single feed item read in whichever source owns it
    pub async fn mark_read(&self, user_id: i64, id: NotificationId) -> Result<()> {
        match id {
            NotificationId::Server(server_id) => self.store.mark_read(server_id).await?,
            NotificationId::Local(local_id) => {
                if !self.journal.mark_read(user_id, local_id).await? {
                    return Err(AppError::not_found("Reminder", local_id));
                }
            }
        }

        self.signal.notify();
        Ok(())
    }

    /// Mark every notification of the user read: durable store first, then
    /// the local journal. Both sides are always attempted.
    pub async fn mark_all_read(&self, user_id: i64) -> MarkAllReadOutcome {
        let durable = SourceOutcome::from_result("durable", self.store.mark_all_read(user_id).await);
        let local = SourceOutcome::from_result("local", self.journal.mark_all_read(user_id).await);

        if durable.is_ok() || local.is_ok() {
            self.signal.notify();
        }

        tracing::info!(
            "Marked all notifications read for user {} (durable: {:?}, local: {:?})",
            user_id,
            durable,
            local
        );

        MarkAllReadOutcome { durable, local }
    }

    /// Keep a feed for `user_id` current.
    ///
    /// The returned receiver starts with the feed as of the call, or with
    /// the local entries alone when the durable store is unreachable. A
    /// background task recomputes it on every change signal and every
    /// `refresh` period until all receivers are dropped. Refresh failures
    /// are logged and the last good feed is kept.
    pub async fn watch(&self, user_id: i64, refresh: Duration) -> watch::Receiver<Feed> {
        let initial = match self.get_feed(user_id).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(
                    "Durable notifications unavailable for user {}, showing local reminders only: {}",
                    user_id,
                    e
                );
                merge_feed(user_id, Vec::new(), self.journal.load().await)
            }
        };
        let (tx, rx) = watch::channel(initial);

        let reconciler = self.clone();
        let mut changes = self.signal.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + refresh, refresh);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    received = changes.recv() => match received {
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = interval.tick() => {}
                }

                match reconciler.get_feed(user_id).await {
                    Ok(feed) => {
                        if tx.send(feed).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Feed refresh failed for user {}: {}", user_id, e);
                    }
                }
            }

            tracing::debug!("Feed watcher for user {} stopped", user_id);
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::tests::{create_test_repo, create_test_user};
    use crate::database::NewNotification;
    use crate::storage::{MemoryJournal, ReminderKind};
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn server(id: i64, user_id: i64, minute: u32, read: bool) -> Notification {
        Notification {
            id,
            user_id,
            title: format!("Server {}", id),
            message: "msg".to_string(),
            kind: NotificationKind::Other,
            read,
            created_at: Utc.with_ymd_and_hms(2026, 10, 15, 9, minute, 0).unwrap(),
        }
    }

    fn local(user_id: i64, source_id: i64, minute: u32) -> LocalReminderEntry {
        LocalReminderEntry {
            id: Uuid::new_v4(),
            user_id,
            source_id,
            kind: ReminderKind::Schedule,
            title: "Task Reminder".to_string(),
            message: "It's time for: walk".to_string(),
            read: false,
            created_at: Utc.with_ymd_and_hms(2026, 10, 15, 9, minute, 0).unwrap(),
        }
    }

    /// Durable store that fails every call
    struct UnreachableStore;

    #[async_trait]
    impl DurableStore for UnreachableStore {
        async fn notifications_for(&self, _user_id: i64) -> Result<Vec<Notification>> {
            Err(AppError::Remote {
                status: 503,
                message: "unavailable".to_string(),
            })
        }

        async fn mark_read(&self, _id: i64) -> Result<()> {
            Err(AppError::Remote {
                status: 503,
                message: "unavailable".to_string(),
            })
        }

        async fn mark_all_read(&self, _user_id: i64) -> Result<()> {
            Err(AppError::Remote {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_merge_sorts_newest_first() {
        let feed = merge_feed(
            1,
            vec![server(1, 1, 5, false), server(2, 1, 30, true)],
            vec![local(1, 7, 10)],
        );

        let minutes: Vec<_> = feed
            .items
            .iter()
            .map(|i| i.created_at.format("%M").to_string())
            .collect();
        assert_eq!(minutes, vec!["30", "10", "05"]);

        for pair in feed.items.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
        assert_eq!(feed.unread_count, 2);
    }

    #[test]
    fn test_merge_isolates_users() {
        let feed = merge_feed(
            1,
            vec![server(1, 1, 0, false), server(2, 2, 1, false)],
            vec![local(1, 7, 2), local(2, 8, 3)],
        );

        assert_eq!(feed.items.len(), 2);
        assert!(feed.items.iter().all(|i| i.user_id == 1));
    }

    #[test]
    fn test_merge_dedups_by_namespaced_id() {
        let shared = local(1, 7, 10);
        let mut updated = shared.clone();
        updated.read = true;

        let feed = merge_feed(
            1,
            vec![server(1, 1, 0, false), server(1, 1, 0, false)],
            vec![shared, updated],
        );

        assert_eq!(feed.items.len(), 2);
        let local_item = feed
            .items
            .iter()
            .find(|i| matches!(i.id, NotificationId::Local(_)))
            .unwrap();
        // Later occurrence wins.
        assert!(local_item.read);
    }

    #[test]
    fn test_server_and_local_ids_never_collide() {
        let server_item = FeedItem::from(server(5, 1, 0, false));
        let local_item = FeedItem::from(local(1, 5, 0));
        assert_ne!(server_item.id, local_item.id);

        let feed = merge_feed(1, vec![server(5, 1, 0, false)], vec![local(1, 5, 0)]);
        assert_eq!(feed.items.len(), 2);
    }

    #[test]
    fn test_merge_with_itself_is_identity() {
        let durable = vec![server(1, 1, 3, false), server(2, 1, 4, true)];
        let locals = vec![local(1, 7, 5)];

        let once = merge_feed(1, durable.clone(), locals.clone());
        let twice = merge_feed(
            1,
            durable.iter().cloned().chain(durable.iter().cloned()).collect(),
            locals.iter().cloned().chain(locals.iter().cloned()).collect(),
        );

        assert_eq!(once, twice);
    }

    #[test]
    fn test_ties_keep_concatenation_order() {
        let feed = merge_feed(1, vec![server(1, 1, 0, false)], vec![local(1, 7, 0)]);

        assert!(matches!(feed.items[0].id, NotificationId::Server(1)));
        assert!(matches!(feed.items[1].id, NotificationId::Local(_)));
    }

    #[test]
    fn test_feed_item_wire_format() {
        let json = serde_json::to_value(FeedItem::from(server(4, 1, 0, false))).unwrap();
        assert_eq!(json["id"]["source"], "server");
        assert_eq!(json["id"]["id"], 4);
        assert_eq!(json["type"], "other");
    }

    async fn reconciler_with_data() -> (NotificationReconciler, MemoryJournal, ChangeSignal, i64) {
        let repo = create_test_repo().await;
        let user = create_test_user(&repo, "asha").await;

        repo.create_notification(NewNotification {
            user_id: user.id,
            title: "Emergency contacts added".to_string(),
            message: "Your family has been notified".to_string(),
            kind: NotificationKind::Other,
        })
        .await
        .unwrap();

        let journal = MemoryJournal::new();
        let mut reminder = local(user.id, 7, 0);
        reminder.created_at = Utc::now() + Duration::seconds(1);
        journal.append(&[reminder]).await.unwrap();

        let signal = ChangeSignal::in_process();
        let reconciler = NotificationReconciler::new(
            Arc::new(repo),
            Arc::new(journal.clone()),
            signal.clone(),
        );

        (reconciler, journal, signal, user.id)
    }

    #[tokio::test]
    async fn test_get_feed_merges_sources() {
        let (reconciler, _journal, _signal, user_id) = reconciler_with_data().await;

        let feed = reconciler.get_feed(user_id).await.unwrap();
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.unread_count, 2);
        assert!(matches!(feed.items[0].id, NotificationId::Local(_)));
        assert_eq!(feed.items[0].kind, NotificationKind::Schedule);
    }

    #[tokio::test]
    async fn test_mark_all_read_clears_unread() {
        let (reconciler, _journal, signal, user_id) = reconciler_with_data().await;
        let mut rx = signal.subscribe();

        let outcome = reconciler.mark_all_read(user_id).await;
        assert!(outcome.is_complete());
        assert!(rx.try_recv().is_ok());

        let feed = reconciler.get_feed(user_id).await.unwrap();
        assert_eq!(feed.unread_count, 0);
    }

    #[tokio::test]
    async fn test_mark_all_read_reports_partial_failure() {
        let journal = MemoryJournal::new();
        journal.append(&[local(1, 7, 0)]).await.unwrap();

        let signal = ChangeSignal::in_process();
        let mut rx = signal.subscribe();
        let reconciler = NotificationReconciler::new(
            Arc::new(UnreachableStore),
            Arc::new(journal.clone()),
            signal,
        );

        let outcome = reconciler.mark_all_read(1).await;
        assert!(!outcome.is_complete());
        assert!(matches!(outcome.durable, SourceOutcome::Failed(_)));
        assert_eq!(outcome.local, SourceOutcome::Ok);

        // Local side still applied and announced.
        assert!(journal.load().await.iter().all(|e| e.read));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_get_feed_fails_when_store_unreachable() {
        let reconciler = NotificationReconciler::new(
            Arc::new(UnreachableStore),
            Arc::new(MemoryJournal::new()),
            ChangeSignal::in_process(),
        );

        assert!(reconciler.get_feed(1).await.is_err());
    }

    #[tokio::test]
    async fn test_mark_read_routes_by_source() {
        let (reconciler, journal, _signal, user_id) = reconciler_with_data().await;

        let feed = reconciler.get_feed(user_id).await.unwrap();
        let local_id = feed.items[0].id;
        reconciler.mark_read(user_id, local_id).await.unwrap();

        let feed = reconciler.get_feed(user_id).await.unwrap();
        assert_eq!(feed.unread_count, 1);
        assert!(journal.load().await[0].read);

        let missing = reconciler
            .mark_read(user_id, NotificationId::Local(Uuid::new_v4()))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));

        let missing_server = reconciler
            .mark_read(user_id, NotificationId::Server(9_999))
            .await;
        assert!(matches!(missing_server, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_watch_refreshes_on_signal() {
        let (reconciler, journal, signal, user_id) = reconciler_with_data().await;

        let mut feed = reconciler.watch(user_id, StdDuration::from_secs(3600)).await;
        assert_eq!(feed.borrow().items.len(), 2);

        journal.append(&[local(user_id, 8, 1)]).await.unwrap();
        signal.notify();

        tokio::time::timeout(StdDuration::from_secs(2), feed.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(feed.borrow().items.len(), 3);
    }

    /// Durable store that is down until `available` is set
    struct RecoveringStore {
        available: std::sync::atomic::AtomicBool,
        notifications: Vec<Notification>,
    }

    impl RecoveringStore {
        fn is_up(&self) -> bool {
            self.available.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DurableStore for RecoveringStore {
        async fn notifications_for(&self, _user_id: i64) -> Result<Vec<Notification>> {
            if !self.is_up() {
                return UnreachableStore.notifications_for(0).await;
            }
            Ok(self.notifications.clone())
        }

        async fn mark_read(&self, _id: i64) -> Result<()> {
            Ok(())
        }

        async fn mark_all_read(&self, _user_id: i64) -> Result<()> {
            Ok(())
        }
    }

    async fn watch_with_store_down(
        refresh: StdDuration,
    ) -> (Arc<RecoveringStore>, ChangeSignal, watch::Receiver<Feed>) {
        let store = Arc::new(RecoveringStore {
            available: std::sync::atomic::AtomicBool::new(false),
            notifications: vec![server(1, 1, 30, false)],
        });
        let journal = MemoryJournal::new();
        journal.append(&[local(1, 7, 0)]).await.unwrap();

        let signal = ChangeSignal::in_process();
        let reconciler = NotificationReconciler::new(store.clone(), Arc::new(journal), signal.clone());
        let feed = reconciler.watch(1, refresh).await;

        (store, signal, feed)
    }

    #[tokio::test]
    async fn test_watch_starts_with_local_entries_when_store_down() {
        let (store, signal, mut feed) = watch_with_store_down(StdDuration::from_secs(3600)).await;

        {
            let current = feed.borrow_and_update();
            assert_eq!(current.items.len(), 1);
            assert!(matches!(current.items[0].id, NotificationId::Local(_)));
        }

        store.available.store(true, std::sync::atomic::Ordering::SeqCst);
        signal.notify();

        tokio::time::timeout(StdDuration::from_secs(2), feed.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(feed.borrow().items.len(), 2);
    }

    #[tokio::test]
    async fn test_watch_retries_periodically_without_signal() {
        let (store, _signal, mut feed) = watch_with_store_down(StdDuration::from_millis(20)).await;
        assert_eq!(feed.borrow_and_update().items.len(), 1);

        store.available.store(true, std::sync::atomic::Ordering::SeqCst);

        tokio::time::timeout(StdDuration::from_secs(2), feed.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(feed.borrow().items.len(), 2);
        assert_eq!(feed.borrow().unread_count, 2);
    }
}
