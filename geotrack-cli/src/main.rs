//! GeoTrack CLI - command-line interface.
//!
//! Tracks a device's position and synchronizes its trajectory with the
//! geofence prediction service.

mod commands;
mod error;

use clap::{Parser, Subcommand, ValueEnum};

use geotrack::logging::{init_logging, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};
use geotrack::sync::Cadence;

use commands::devices::DeviceAction;
use commands::run::RunArgs;
use error::CliError;

/// Auto-send cadence choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CadenceArg {
    /// Manual sends only
    Off,
    /// Every 5 seconds
    S5,
    /// Every 10 seconds
    S10,
    /// Every 30 seconds
    S30,
    /// Every minute
    S60,
}

impl From<CadenceArg> for Cadence {
    fn from(arg: CadenceArg) -> Self {
        match arg {
            CadenceArg::Off => Cadence::Off,
            CadenceArg::S5 => Cadence::Secs5,
            CadenceArg::S10 => Cadence::Secs10,
            CadenceArg::S30 => Cadence::Secs30,
            CadenceArg::S60 => Cadence::Secs60,
        }
    }
}

#[derive(Parser)]
#[command(name = "geotrack")]
#[command(about = "Track a device and predict geofence intrusion", long_about = None)]
#[command(version = geotrack::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a device and synchronize with the prediction service
    Run(RunArgs),
    /// Manage the device registry
    Devices {
        #[command(subcommand)]
        action: DeviceAction,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Devices { action } => commands::devices::run(action),
        Commands::Run(args) => {
            let _guard = init_logging(DEFAULT_LOG_DIR, DEFAULT_LOG_FILE)
                .map_err(|e| CliError::LoggingInit(e.to_string()))?;

            let runtime = tokio::runtime::Runtime::new()
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            runtime.block_on(commands::run::run(args))
        }
    }
}
