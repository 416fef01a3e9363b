use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use meerkat_core::config::AppConfig;
use meerkat_feeds::{
    IpStore, PictureCommand, PingCommand, PublicIpResolver, TempCommand, TemperatureMonitor,
    TemperatureSensor,
};
use meerkat_telegram::{Bot, Shutdown, TelegramTransport};
use meerkat_watchman::{DirectoryMonitor, FileFilter, FileFilterExt, FilenameFilter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const PUBLIC_IP_INTERVAL: Duration = Duration::from_secs(30 * 60);
const TEMPERATURE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Parser, Debug)]
#[command(author, version, about = "Meerkat - Telegram home monitoring bot", long_about = None)]
struct Args {
    /// Respond to commands (/temp, /pic)
    #[arg(long)]
    mode_commands: bool,

    /// Periodic background tasks (public IP change)
    #[arg(long)]
    mode_periodic: bool,

    /// Monitor MONITORED_DIRECTORIES for new images
    #[arg(long)]
    mode_fsmon: bool,

    /// Answer /ping with pong
    #[arg(long)]
    mode_healthcheck: bool,

    /// Report temperature changes of more than 0.5 ℃
    #[arg(long)]
    mode_tempmon: bool,

    /// Label used in the shutdown status
    #[arg(long, default_value = "process")]
    runtime: String,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Keep the guard alive for the whole process, or buffered lines are lost.
    let _guard = init_logging(args.log_file.as_deref());
    meerkat_core::init();

    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Error: Configuration missing or invalid: {}", e);
            eprintln!("   Please ensure ~/.meerkat/.env exists and sets TELEGRAM_APITOKEN and CHAT_ID.");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone(), args.runtime.clone()));

    match run(&args, &config, cancel).await {
        Ok(status) => println!("{}", status),
        Err(e) => {
            error!("❌ {:#}", e);
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(log_file: Option<&std::path::Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_file.and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("⚠️ Cannot open log file {}: {}", path.display(), e))
            .ok()
    });

    match file {
        Some(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .init();
            None
        }
    }
}

async fn cancel_on_signal(cancel: CancellationToken, runtime: String) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("🛑 {} was interrupted by system signal", runtime);
    cancel.cancel();
}

async fn run(args: &Args, config: &AppConfig, cancel: CancellationToken) -> anyhow::Result<Shutdown> {
    let chats = config.authorized_chats()?;
    if config.telegram_apitoken.trim().is_empty() {
        anyhow::bail!("TELEGRAM_APITOKEN is not set");
    }

    // 1. Telegram API
    let transport = TelegramTransport::new(config.telegram_apitoken.trim())?;
    if let Err(status) = transport.connect(&cancel, &args.runtime).await {
        return Ok(status);
    }
    info!("telegram API initialized");
    let updates = transport.spawn_updates(cancel.clone());

    let mut bot = Bot::new(args.runtime.as_str(), transport, chats, cancel.clone());
    let sensor = Arc::new(TemperatureSensor::new(config.sensor_device_path()));

    // 2. Service modes
    if args.mode_commands {
        info!("adding commands handlers");
        bot.add_handler("/temp", TempCommand::new(sensor.clone()));
        if let Some(url) = config.image_url() {
            bot.add_handler("/pic", PictureCommand::new(url)?);
        }
    }

    if args.mode_periodic {
        info!("adding periodic tasks handlers");
        let resolver = PublicIpResolver::new(config.public_ip_resolver(), IpStore::default_location())?;
        bot.add_periodic_task(PUBLIC_IP_INTERVAL, "Public IP Changed:", resolver);
    }

    if args.mode_fsmon {
        info!("adding background tasks");
        add_directory_monitors(&mut bot, config)?;
    }

    if args.mode_healthcheck {
        bot.add_handler("/ping", PingCommand);
    }

    if args.mode_tempmon {
        bot.add_periodic_task(
            TEMPERATURE_INTERVAL,
            "Temperature changed:",
            TemperatureMonitor::new(sensor),
        );
    }

    // 3. Dispatch until cancelled
    Ok(bot.run(updates).await)
}

fn add_directory_monitors(bot: &mut Bot<TelegramTransport>, config: &AppConfig) -> anyhow::Result<()> {
    let directories = config.monitored_directories();
    if directories.is_empty() {
        warn!("👀 Watchman: MONITORED_DIRECTORIES is empty, nothing to watch");
        return Ok(());
    }

    let names = FilenameFilter::new(config.file_patterns().as_slice()).context("invalid FILE_PATTERNS")?;
    let filter: Arc<dyn FileFilter> = match config.rate_limit()? {
        Some(spacing) => Arc::new(names.created_after_now().rate_limited(spacing)),
        None => Arc::new(names.created_after_now()),
    };

    for dir in directories {
        let monitor = DirectoryMonitor::new(&dir, filter.clone())
            .with_context(|| format!("cannot monitor {}", dir.display()))?;
        bot.add_background_task(move |cancel, events| monitor.run(cancel, events));
    }
    Ok(())
}
