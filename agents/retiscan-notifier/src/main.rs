use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use directories::ProjectDirs;
use retiscan_config::Settings;
use retiscan_connection::{ConnectionManager, StaticTokenSource, TokenSource};
use retiscan_services::{
    FileStorage, NoopSoundPlayer, NotificationStore, Presenter, TracingPresenter, live,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "retiscan-notifier", about = "Headless retina-dashboard notification agent")]
struct Args {
    /// Dashboard API base URL, overrides the configured server.base_url.
    #[arg(long)]
    server: Option<String>,

    /// Bearer token for the session. Falls back to RETISCAN_TOKEN.
    #[arg(long)]
    token: Option<String>,

    /// Directory for the persisted notification cache.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Cap on locally retained notifications.
    #[arg(long)]
    max_records: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "retiscan_notifier=debug,retiscan_services=debug,retiscan_connection=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut settings = Settings::load()?;
    if let Some(server) = args.server {
        settings.server.base_url = server;
    }
    if let Some(max_records) = args.max_records {
        settings.store.max_records = max_records;
    }

    let data_dir = args.data_dir.unwrap_or_else(|| {
        ProjectDirs::from("", "", "retiscan-notifier")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    });
    info!(?data_dir, server = %settings.server.base_url, "Starting retiscan-notifier");

    let storage = Arc::new(FileStorage::new(data_dir)?);
    let presenter = Arc::new(TracingPresenter);
    let store = Arc::new(NotificationStore::new(
        &settings,
        storage,
        presenter.clone(),
        Arc::new(NoopSoundPlayer),
    ));
    store.initialize();
    info!(
        records = store.len(),
        unread = store.unread_count(),
        "Notification cache loaded"
    );

    let token = args.token.or_else(|| std::env::var("RETISCAN_TOKEN").ok());
    let token_source: Arc<dyn TokenSource> = match token {
        Some(token) => Arc::new(StaticTokenSource::new(token)),
        None => Arc::new(StaticTokenSource::absent()),
    };

    let conn = ConnectionManager::new(&settings, token_source);
    live::attach(&conn, store.clone());

    // Connectivity notices become toasts, like in the dashboard UI.
    let mut notices = conn.subscribe_notices();
    let notice_presenter = presenter.clone();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            notice_presenter.show_toast(notice.message, notice.severity());
        }
    });

    let mut state_rx = conn.subscribe_state();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow();
            info!(?state, "Connection state changed");
        }
    });

    conn.connect().await;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    conn.disconnect().await;

    Ok(())
}
