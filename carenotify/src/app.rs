//! Application state and initialization
//!
//! Wires services together for the two ways the binary runs: the
//! notification server (`serve`) and the per-device reminder agent
//! (`agent`).

use crate::config::{
    Settings, DUE_CHECK_INTERVAL_SECS, FEED_REFRESH_INTERVAL_SECS, JOURNAL_POLL_INTERVAL_MS,
};
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{
    AlertDispatcher, AlertTransport, ApiClient, CareService, ChangeSignal, ContactsService,
    JournalWatcher, LogTransport, NotificationReconciler, RemindersService, ReportsService,
    SmtpTransport, UsersService,
};
use crate::storage::FileJournal;
use std::sync::Arc;
use std::time::Duration;

/// Central server state shared by every route handler
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub care_service: CareService,
    pub contacts_service: ContactsService,
    pub reports_service: ReportsService,
    pub users_service: UsersService,
}

impl AppState {
    pub fn new(repo: Repository, transport: Arc<dyn AlertTransport>, server_url: &str) -> Self {
        let dispatcher = AlertDispatcher::new(repo.clone(), transport, server_url);

        Self {
            care_service: CareService::new(repo.clone()),
            contacts_service: ContactsService::new(repo.clone(), dispatcher.clone()),
            reports_service: ReportsService::new(repo.clone(), dispatcher),
            users_service: UsersService::new(repo.clone()),
            repo,
        }
    }
}

/// Server setup - opens the database and picks the alert transport
pub async fn setup(settings: &Settings) -> Result<AppState> {
    tracing::info!("Initializing notification server");

    let pool = create_pool(&settings.database_path).await?;
    let repo = Repository::new(pool);

    let transport: Arc<dyn AlertTransport> = match &settings.smtp {
        Some(smtp) => Arc::new(SmtpTransport::new(smtp)?),
        None => {
            tracing::warn!("SMTP not configured, emergency alerts will only be logged");
            Arc::new(LogTransport)
        }
    };

    tracing::info!("Notification server initialized successfully");

    Ok(AppState::new(repo, transport, &settings.server_url))
}

/// Serve the HTTP API until the process is interrupted
pub async fn serve(settings: Settings) -> Result<()> {
    let state = setup(&settings).await?;
    let app = crate::routes::router(state);

    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    tracing::info!("Listening on {}", settings.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Notification server stopped");
    Ok(())
}

/// Run the reminder agent for one user until the process is interrupted.
///
/// The agent checks for due reminders every minute, watches the shared
/// journal for writes from other agents and logs every feed update.
pub async fn run_agent(settings: Settings, user_id: i64) -> Result<()> {
    tracing::info!("Starting reminder agent for user {}", user_id);

    let client = Arc::new(ApiClient::new(settings.server_url.clone())?);
    let journal = FileJournal::new(settings.journal_path());
    let signal = ChangeSignal::in_process();

    tracing::info!("Reminder journal: {:?}", journal.path());

    let reminders = RemindersService::new(client.clone(), Arc::new(journal.clone()), signal.clone());
    let scheduler = reminders.start_scheduler(user_id);

    let watcher = JournalWatcher::new(
        journal.clone(),
        signal.clone(),
        Duration::from_millis(JOURNAL_POLL_INTERVAL_MS),
    )
    .spawn();

    let reconciler = NotificationReconciler::new(client, Arc::new(journal), signal);

    // Starts from local reminders alone if the server is down and keeps retrying.
    let mut feed = reconciler
        .watch(user_id, Duration::from_secs(FEED_REFRESH_INTERVAL_SECS))
        .await;
    let feed_task = tokio::spawn(async move {
        loop {
            {
                let current = feed.borrow_and_update();
                tracing::info!(
                    "Notifications for user {}: {} total, {} unread",
                    user_id,
                    current.items.len(),
                    current.unread_count
                );
            }

            if feed.changed().await.is_err() {
                break;
            }
        }
    });

    tracing::info!(
        "Reminder agent running (due-check every {}s), press Ctrl+C to stop",
        DUE_CHECK_INTERVAL_SECS
    );
    shutdown_signal().await;

    scheduler.abort();
    watcher.abort();
    feed_task.abort();

    tracing::info!("Reminder agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
