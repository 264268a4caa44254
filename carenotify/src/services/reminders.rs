//! Reminder trigger engine
//!
//! Compares the current wall-clock minute with each schedule and medicine
//! due time and records a reminder in the local journal the first time an
//! item falls due on a given calendar day. Runs every minute, with the
//! first check immediately on start so reminders still due today are
//! caught up.

use crate::config::{DUE_CHECK_INTERVAL_SECS, REMINDER_TIME_FORMAT};
use crate::database::{Medicine, Repository, Schedule};
use crate::error::Result;
use crate::services::signal::ChangeSignal;
use crate::storage::{LocalReminderEntry, ReminderJournal, ReminderKind};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Where the engine reads a user's schedules and medicines from
#[async_trait]
pub trait CareRecordSource: Send + Sync {
    async fn schedules(&self, user_id: i64) -> Result<Vec<Schedule>>;
    async fn medicines(&self, user_id: i64) -> Result<Vec<Medicine>>;
}

#[async_trait]
impl CareRecordSource for Repository {
    async fn schedules(&self, user_id: i64) -> Result<Vec<Schedule>> {
        self.list_schedules(user_id).await
    }

    async fn medicines(&self, user_id: i64) -> Result<Vec<Medicine>> {
        self.list_medicines(user_id).await
    }
}

/// Build the reminders that fall due at `now` for `user_id`.
///
/// An item is due when its `HH:mm` time equals `now` rendered as `HH:mm`.
/// Schedules only fire while not completed; medicines always fire. An
/// item never fires twice on the same calendar day (in `now`'s time zone):
/// any journal entry for the same `(source_id, kind)` created since local
/// midnight suppresses it.
pub fn evaluate_due_reminders<Tz>(
    now: &DateTime<Tz>,
    user_id: i64,
    schedules: &[Schedule],
    medicines: &[Medicine],
    journal: &[LocalReminderEntry],
) -> Vec<LocalReminderEntry>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let current_time = now.format(REMINDER_TIME_FORMAT).to_string();
    let today = now.date_naive();
    let tz = now.timezone();
    let created_at = now.with_timezone(&Utc);

    let created_today = |source_id: i64, kind: ReminderKind| {
        journal.iter().any(|e| {
            e.source_id == source_id
                && e.kind == kind
                && e.created_at.with_timezone(&tz).date_naive() >= today
        })
    };

    let reminder = |source_id: i64, kind: ReminderKind, title: &str, message: String| {
        LocalReminderEntry {
            id: Uuid::new_v4(),
            user_id,
            source_id,
            kind,
            title: title.to_string(),
            message,
            read: false,
            created_at,
        }
    };

    let mut due = Vec::new();

    for schedule in schedules
        .iter()
        .filter(|s| s.user_id == user_id && !s.completed && s.time == current_time)
    {
        if created_today(schedule.id, ReminderKind::Schedule) {
            continue;
        }
        due.push(reminder(
            schedule.id,
            ReminderKind::Schedule,
            "Task Reminder",
            format!("It's time for: {}", schedule.title),
        ));
    }

    for medicine in medicines
        .iter()
        .filter(|m| m.user_id == user_id && m.time == current_time)
    {
        if created_today(medicine.id, ReminderKind::Medicine) {
            continue;
        }
        due.push(reminder(
            medicine.id,
            ReminderKind::Medicine,
            "Medicine Reminder",
            format!("Time for your {} ({})", medicine.name, medicine.dosage),
        ));
    }

    due
}

/// Periodic due-check writing to the local journal
#[derive(Clone)]
pub struct RemindersService {
    records: Arc<dyn CareRecordSource>,
    journal: Arc<dyn ReminderJournal>,
    signal: ChangeSignal,
}

impl RemindersService {
    pub fn new(
        records: Arc<dyn CareRecordSource>,
        journal: Arc<dyn ReminderJournal>,
        signal: ChangeSignal,
    ) -> Self {
        Self {
            records,
            journal,
            signal,
        }
    }

    /// Run one due-check against the local clock
    pub async fn run_due_check(&self, user_id: i64) -> Result<Vec<LocalReminderEntry>> {
        self.run_due_check_at(user_id, &Local::now()).await
    }

    /// Run one due-check as of `now`. New entries are appended in a single
    /// journal write followed by one change signal.
    pub async fn run_due_check_at<Tz>(
        &self,
        user_id: i64,
        now: &DateTime<Tz>,
    ) -> Result<Vec<LocalReminderEntry>>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let schedules = self.records.schedules(user_id).await?;
        let medicines = self.records.medicines(user_id).await?;

        if schedules.is_empty() && medicines.is_empty() {
            return Ok(Vec::new());
        }

        let journal = self.journal.load().await;
        let due = evaluate_due_reminders(now, user_id, &schedules, &medicines, &journal);

        if due.is_empty() {
            return Ok(due);
        }

        for entry in &due {
            tracing::info!(
                "Triggering {:?} reminder for item {} (user {})",
                entry.kind,
                entry.source_id,
                user_id
            );
        }

        self.journal.append(&due).await?;
        self.signal.notify();

        Ok(due)
    }

    /// Start the background due-check for `user_id`
    pub fn start_scheduler(self, user_id: i64) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting reminders scheduler for user {}", user_id);

            let mut interval = tokio::time::interval(Duration::from_secs(DUE_CHECK_INTERVAL_SECS));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                if let Err(e) = self.run_due_check(user_id).await {
                    tracing::error!("Error checking reminders: {}", e);
                }
            }
        })
    }
}
