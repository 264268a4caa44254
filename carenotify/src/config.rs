//! Application configuration
//!
//! Central location for configuration constants, validation boundaries
//! and the environment-driven runtime settings.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

// ===== Reminder Engine =====

/// Interval between due-checks. The first check runs immediately on start.
pub const DUE_CHECK_INTERVAL_SECS: u64 = 60;

/// Wall-clock format compared against schedule and medicine times.
pub const REMINDER_TIME_FORMAT: &str = "%H:%M";

// ===== Local Reminder Journal =====

/// Well-known file name of the local reminder journal inside the data dir.
/// Every agent pointed at the same data dir shares this journal.
pub const JOURNAL_FILE_NAME: &str = "carenotify_notifications.json";

/// How often the journal watcher checks for writes from other processes
pub const JOURNAL_POLL_INTERVAL_MS: u64 = 1_000;

/// Feed refresh period when no change signal arrives. Picks up new server
/// notifications and recovers from an unreachable server.
pub const FEED_REFRESH_INTERVAL_SECS: u64 = 60;

/// Buffered change signals per subscriber before it is considered lagged
pub const CHANGE_SIGNAL_CAPACITY: usize = 16;

// ===== Emergency Alerts =====

/// Systolic reading above this marks a report abnormal
pub const SYSTOLIC_ALERT_THRESHOLD: f64 = 140.0;

/// Diastolic reading above this marks a report abnormal
pub const DIASTOLIC_ALERT_THRESHOLD: f64 = 90.0;

/// Maximum emergency contacts a user may register
pub const MAX_EMERGENCY_CONTACTS: usize = 3;

/// Name used in alert subjects and signatures
pub const PLATFORM_NAME: &str = "WellnessBuddy";

pub const DEFAULT_CONTACT_NAME: &str = "Family Member";
pub const DEFAULT_CONTACT_RELATIONSHIP: &str = "Family";

// ===== Care Records =====

/// Stock level assigned to a medicine when none is given
pub const DEFAULT_MEDICINE_STOCK: i64 = 30;

/// Runtime settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Directory holding the local reminder journal.
    pub data_dir: PathBuf,
    /// Base URL of the notification server, used by the agent and in
    /// links sent to emergency contacts.
    pub server_url: String,
    /// SMTP delivery for emergency alerts; alerts are only logged when unset.
    pub smtp: Option<SmtpSettings>,
}

/// Outgoing mail server settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CARENOTIFY_ADDR` | Server bind address | `127.0.0.1:5000` |
    /// | `CARENOTIFY_DATABASE` | SQLite database file | `carenotify.db` |
    /// | `CARENOTIFY_DATA_DIR` | Agent data directory | `.` |
    /// | `CARENOTIFY_SERVER_URL` | Notification server URL | `http://127.0.0.1:5000` |
    /// | `CARENOTIFY_SMTP_HOST` | SMTP relay host | (alerts logged only) |
    /// | `CARENOTIFY_SMTP_PORT` | SMTP relay port | `587` |
    /// | `CARENOTIFY_SMTP_USERNAME` | SMTP username | (required with host) |
    /// | `CARENOTIFY_SMTP_PASSWORD` | SMTP password | (required with host) |
    /// | `CARENOTIFY_SMTP_FROM` | Sender address | SMTP username |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("CARENOTIFY_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_path = env::var("CARENOTIFY_DATABASE")
            .unwrap_or_else(|_| "carenotify.db".to_string())
            .into();

        let data_dir = env::var("CARENOTIFY_DATA_DIR")
            .unwrap_or_else(|_| ".".to_string())
            .into();

        let server_url = env::var("CARENOTIFY_SERVER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string())
            .trim_end_matches('/')
            .to_string();

        let smtp = match env::var("CARENOTIFY_SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpSettings::from_env(host)?),
            _ => None,
        };

        Ok(Self {
            addr,
            database_path,
            data_dir,
            server_url,
            smtp,
        })
    }

    /// Path of the local reminder journal.
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join(JOURNAL_FILE_NAME)
    }
}

impl SmtpSettings {
    fn from_env(host: String) -> Result<Self, ConfigError> {
        let port = match env::var("CARENOTIFY_SMTP_PORT") {
            Ok(port) => port.parse().map_err(|_| ConfigError::InvalidSmtpPort)?,
            Err(_) => 587,
        };

        let username =
            env::var("CARENOTIFY_SMTP_USERNAME").map_err(|_| ConfigError::MissingSmtpUsername)?;
        let password =
            env::var("CARENOTIFY_SMTP_PASSWORD").map_err(|_| ConfigError::MissingSmtpPassword)?;
        let from = env::var("CARENOTIFY_SMTP_FROM").unwrap_or_else(|_| username.clone());

        Ok(Self {
            host,
            port,
            username,
            password,
            from,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid CARENOTIFY_ADDR format")]
    InvalidAddr,

    #[error("Invalid CARENOTIFY_SMTP_PORT")]
    InvalidSmtpPort,

    #[error("CARENOTIFY_SMTP_USERNAME is required when CARENOTIFY_SMTP_HOST is set")]
    MissingSmtpUsername,

    #[error("CARENOTIFY_SMTP_PASSWORD is required when CARENOTIFY_SMTP_HOST is set")]
    MissingSmtpPassword,
}
