//! # SHIFTIO HAL Binary
//!
//! Refreshes the configured shift-register expanders until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Run against real spidev/sysfs hardware
//! shiftio_hal --config /etc/shiftio/io.toml
//!
//! # Run with the simulation backend
//! shiftio_hal --config config/io.toml --simulate
//!
//! # Verbose logging, JSON output
//! shiftio_hal --config config/io.toml -s -v --json
//! ```

use clap::Parser;
use shiftio_common::config::LogLevel;
use shiftio_common::consts::DEFAULT_CONFIG_PATH;
use shiftio_common::hal::consts::{DEFAULT_BACKEND, HAL_SERVICE_NAME};
use shiftio_hal::core::HalCore;
use shiftio_hal::driver_registry::DriverRegistry;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// SHIFTIO HAL - periodic shift-register I/O refresh
#[derive(Parser, Debug)]
#[command(name = "shiftio_hal")]
#[command(version)]
#[command(about = "Periodic shift-register I/O refresh with pluggable backends")]
#[command(long_about = None)]
struct Args {
    /// Path to the I/O configuration file (io.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use the simulation backend
    #[arg(short = 's', long)]
    simulate: bool,

    /// Backend to load (ignored with --simulate)
    #[arg(short, long, default_value = DEFAULT_BACKEND)]
    driver: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// List available backends and exit
    #[arg(long)]
    list_drivers: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("HAL failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let registry = DriverRegistry::with_builtin();

    if args.list_drivers {
        for name in registry.list_drivers() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = HalCore::load_config(&args.config);
    let level = config
        .as_ref()
        .map_or(LogLevel::Info, |c| c.shared.log_level);
    setup_tracing(&args, level);

    info!(
        "{} v{} starting...",
        HAL_SERVICE_NAME,
        env!("CARGO_PKG_VERSION")
    );
    let config = config?;
    info!("Configuration loaded from {:?}", args.config);
    info!("Service instance: {}", config.shared.service_name);

    let backend_name = if args.simulate {
        info!("Simulation mode enabled");
        "simulation"
    } else {
        args.driver.as_str()
    };
    let backend = registry.create_driver(backend_name)?;

    let mut hal_core = HalCore::new(config)?;
    hal_core.init(backend)?;
    hal_core.start()?;

    let result = hal_core.run();
    hal_core.shutdown()?;
    result?;

    info!("{} shutdown complete", HAL_SERVICE_NAME);
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
