//! Services module
//!
//! Business logic that coordinates between the routes, the repository,
//! the local reminder journal and the alert transports.

pub mod alerts;
pub mod care;
pub mod contacts;
pub mod notifications;
pub mod reminders;
pub mod remote;
pub mod reports;
pub mod signal;
pub mod users;

pub use alerts::{AlertDispatcher, AlertTransport, LogTransport, SmtpTransport};
#[cfg(any(test, feature = "test-util"))]
pub use alerts::MemoryTransport;
pub use care::CareService;
pub use contacts::ContactsService;
pub use notifications::{DurableStore, Feed, NotificationId, NotificationReconciler};
pub use reminders::{CareRecordSource, RemindersService};
pub use remote::ApiClient;
pub use reports::ReportsService;
pub use signal::{ChangeSignal, JournalWatcher};
pub use users::UsersService;
