use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tonview::config;
use tonview::infrastructure::runtime::{run_polling, PollSettings};
use tonview::infrastructure::telegram::{TelegramConfig, TelegramTransport};
use tonview::infrastructure::tonapi::TonapiFactory;
use tonview::modules::throttle::TokioClock;
use tonview::store::{SessionStore, SqliteSessionStore};
use tonview::{build_app, AppSettings};

#[derive(Debug, Parser)]
#[command(
    name = "tonview",
    version,
    about = "tonview: a Telegram bot for browsing and exporting TON accounts"
)]
struct Args {
    /// Config file (defaults to ~/.config/tonview/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bot token; overrides BOT_TOKEN and the config file
    #[arg(long)]
    token: Option<String>,

    /// SQLite file holding user sessions
    #[arg(long)]
    session_db: Option<PathBuf>,

    /// Serve testnet on both networks (staging deployments)
    #[arg(long)]
    testnet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tonview=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = config::load(args.config.as_deref())?;
    if let Some(token) = args.token {
        config.bot.token = Some(token);
    }
    if let Some(path) = args.session_db {
        config.store.path = Some(path);
    }
    if args.testnet {
        config.provider.mainnet_url = config.provider.testnet_url.clone();
    }

    let token = config
        .bot
        .token
        .clone()
        .context("no bot token; pass --token or set BOT_TOKEN")?;
    if config.provider.api_key.is_none() {
        warn!("no shared TONAPI key configured; anonymous limits apply");
    }

    let db_path = config
        .session_db_path()
        .context("cannot determine a session database path; pass --session-db")?;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create data directory {}", parent.display()))?;
    }
    let store = Arc::new(SqliteSessionStore::open(&db_path, config.session_ttl())?);

    let transport = Arc::new(TelegramTransport::new(TelegramConfig::new(
        token,
        config.poll_timeout(),
    ))?);
    let providers = Arc::new(TonapiFactory::new(config.provider_config())?);

    let app = Arc::new(build_app(
        AppSettings::from_config(&config),
        transport.clone(),
        providers,
        store.clone(),
        Arc::new(TokioClock),
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; shutting down");
            let _ = stop_tx.send(true);
        }
    });

    info!(sessions = %db_path.display(), testnet_only = args.testnet, "tonview starting");
    run_polling(transport, app, PollSettings::default(), stop_rx).await?;

    store.close().await.context("close session store")?;
    info!("tonview stopped");
    Ok(())
}
