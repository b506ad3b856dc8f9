//! Tide panel
//!
//! Long-running, unattended process: rotates through NOAA stations and
//! drives the LED matrix with tides, temperatures, wind and the moon phase.
//!
//! ## Architecture
//! - **Panel loop** (tokio, current thread): owns the driver, frame state
//!   and compositor; fetches run as tasks on the same runtime
//! - **Status API** (axum, optional): read-only view of what is displayed
//!
//! ## Usage
//! ```sh
//! cargo build --release --features hardware
//! sudo ./target/release/tide-panel --config /etc/tide-panel.toml
//!
//! # Off the Pi, without the matrix library
//! cargo run -- --simulate
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tide_panel::config::{Config, DEFAULT_CONFIG_PATH};
use tide_panel::driver::MatrixDriver;
use tide_panel::noaa::NoaaClient;
use tide_panel::render::{self, SharedStatus};
use tide_panel::server::{self, AppState};
use tide_panel::{Shutdown, assets, setup_signal_handler};
use tracing_subscriber::EnvFilter;

/// Tide, weather and moon-phase display for RGB LED matrix panels
#[derive(Parser)]
#[command(name = "tide-panel")]
#[command(version)]
struct Args {
    /// TOML configuration file [default: tide-panel.toml, optional]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Run without the LED matrix, writing frames to `snapshot_path` instead
    #[arg(long)]
    simulate: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let (path, required) = match args.config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let config = Config::load(&path, required)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    if args.print_config {
        print!("{}", config.to_toml().context("serializing configuration")?);
        return Ok(());
    }

    tracing::info!("Tide panel v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Panel: {}x{} ({} sub-panels)",
        config.panel.cols,
        config.panel.rows,
        config.panel.sub_panels
    );
    tracing::info!("Stations: {:?}", config.stations);

    let missing = assets::missing_moon_phases(&config.assets.moon_dir);
    if !missing.is_empty() {
        tracing::warn!(
            "Moon phase images missing from {}: {:?}",
            config.assets.moon_dir.display(),
            missing
        );
    }

    let shutdown = setup_signal_handler().context("installing signal handler")?;
    let driver = build_driver(&config, args.simulate)?;
    let fetcher = NoaaClient::new(std::time::Duration::from_secs(config.noaa.timeout_secs))
        .context("building HTTP client")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    runtime.block_on(serve_panel(config, driver, fetcher, shutdown));

    tracing::info!("Stopped.");
    Ok(())
}

async fn serve_panel<D: MatrixDriver>(
    config: Config,
    driver: D,
    fetcher: NoaaClient,
    shutdown: Shutdown,
) {
    let status = SharedStatus::default();

    if let Some(addr) = config.status_addr.clone() {
        let state = AppState {
            status: status.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = server::serve(&addr, state).await {
                tracing::error!("Status API on {} failed: {}", addr, e);
            }
        });
    }

    render::run(config, driver, fetcher, status, shutdown).await;
}

#[cfg(feature = "hardware")]
fn build_driver(config: &Config, simulate: bool) -> anyhow::Result<impl MatrixDriver + use<>> {
    if simulate {
        tracing::warn!("--simulate ignored; this build drives the LED matrix");
    }
    let driver = tide_panel::driver::HardwareDriver::new(config.panel, &config.hardware)?;
    tracing::info!("LED matrix initialised ({})", config.hardware.mapping);
    Ok(driver)
}

/// A build without the matrix library only runs when simulation was asked for.
#[cfg(not(feature = "hardware"))]
fn require_simulation(simulate: bool) -> anyhow::Result<()> {
    if !simulate {
        anyhow::bail!(
            "built without the 'hardware' feature; rebuild with `--features hardware` \
             or pass --simulate to run the simulated driver"
        );
    }
    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn build_driver(config: &Config, simulate: bool) -> anyhow::Result<impl MatrixDriver + use<>> {
    require_simulation(simulate)?;
    tracing::warn!("Running the simulated driver; the LED matrix is not used");
    if let Some(path) = &config.snapshot_path {
        tracing::info!("Writing frames to {}", path.display());
    }
    Ok(tide_panel::driver::SimulatedDriver::new(
        config.panel,
        config.hardware.initial_brightness,
        config.snapshot_path.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn args_accept_simulate_flag() {
        let args = Args::try_parse_from(["tide-panel", "--simulate", "--config", "panel.toml"]).unwrap();

        assert!(args.simulate);
        assert_eq!(args.config, Some(PathBuf::from("panel.toml")));
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn simulated_build_refuses_to_start_without_opt_in() {
        let err = require_simulation(false).unwrap_err();

        assert!(err.to_string().contains("--features hardware"));
        assert!(require_simulation(true).is_ok());
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn simulated_driver_built_when_requested() {
        let config = Config::default();

        assert!(build_driver(&config, true).is_ok());
        assert!(build_driver(&config, false).is_err());
    }
}
