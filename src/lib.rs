pub mod anern;     // Inverter protocol: checksum, framing, response grammar, transport
pub mod config;    // Configuration management
pub mod error;     // Protocol and transport errors
pub mod options;   // Command line options parsing
pub mod prelude;   // Common imports and types
pub mod scheduler; // Periodic polling

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::scheduler::Scheduler;
use std::str::FromStr;
use std::sync::Arc;

/// Initialises logging from `RUST_LOG`, falling back to info until the config is read.
pub fn init_logging() {
    // without RUST_LOG everything reaches the logger and log::max_level does the filtering
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();

    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(log::LevelFilter::Info);
    }
}

// RUST_LOG wins over the config file
fn apply_loglevel(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }

    match log::LevelFilter::from_str(level) {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => warn!("ignoring invalid loglevel {:?}", level),
    }
}

/// Main application entry point
///
/// Loads the configuration, then polls the inverter until `shutdown_rx` fires (or once, with
/// `--once`).
pub async fn app(shutdown_rx: tokio::sync::broadcast::Receiver<()>, options: Options) -> Result<()> {
    init_logging();

    info!("anern-monitor {} starting with config file: {}", CARGO_PKG_VERSION, options.config_file);

    let config = Config::new(options.config_file.clone())?;
    apply_loglevel(config.loglevel());

    let inverter = Arc::new(Inverter::<SerialTransport>::from_config(&config.inverter));
    let scheduler = Scheduler::new(inverter, config.poll.clone(), config.output);
    let mut stdout = std::io::stdout();

    if options.once {
        scheduler.poll_once(&mut stdout).await?;
    } else {
        scheduler.start(&mut stdout, shutdown_rx).await?;
    }

    info!("Application shutdown complete");
    Ok(())
}
