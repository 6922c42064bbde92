// mash entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database
// 4. Build backend client, wallet registry and battle selector
// 5. Create mpsc channels
// 6. Spawn app logic task
// 7. Run the terminal front-end until the user quits
// 8. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use mash_app::{local_wallet, terminal};
use mash_core::app::{self, AppState};
use mash_core::battle::BattlePairSelector;
use mash_core::config;
use mash_core::db::Database;
use mash_core::protocol::UiSink;
use mash_http::HttpBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("mash starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: backend={}, stats every {}s",
        config.backend.base_url, config.polling.stats_interval_secs
    );

    // 3. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Collaborators
    let backend = HttpBackend::from_config(&config.backend)?;
    let wallets = local_wallet::registry_from_config(&config.wallets);
    let selector = BattlePairSelector::new(config.battle.history_len, config.battle.max_redraws);

    // 5. Channels
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui, ui_rx) = UiSink::channel();
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let state = AppState::new(
        &config,
        Arc::new(backend),
        Arc::new(db),
        wallets,
        selector,
        ui,
        completion_tx,
    );

    // 6. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, completion_rx, state).await {
            error!("Application loop error: {}", e);
        }
    });

    // 7. Terminal front-end; blocks until quit or stdin closes
    info!("Application ready");
    if let Err(e) = terminal::run(ui_rx, cmd_tx).await {
        error!("Terminal error: {}", e);
    }

    // 8. Cleanup: wait for app task to finish (with timeout)
    let _ = tokio::time::timeout(Duration::from_secs(5), app_handle).await;

    info!("mash shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by the front-end).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("mash.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("mash=info,mash_app=info,mash_core=info,mash_http=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
