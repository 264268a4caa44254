//! Storage module
//!
//! Client-side storage for the local reminder journal.

pub mod journal;

pub use journal::{FileJournal, LocalReminderEntry, MemoryJournal, ReminderJournal, ReminderKind};
