pub mod history;
pub mod session;
pub mod settings;
pub mod shutdown;
pub mod transfer;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use history::{process_history_command, process_hourly_command, process_today_command};
use history::{HistoryCommand, HourlyCommand};
use session::{process_start_command, StartCommand};
use settings::{process_settings_command, SettingsCommand};
use tracing::{info, level_filters::LevelFilter};
use transfer::{process_export_command, process_import_command};

use crate::{
    store::storage::FileStorage,
    utils::{
        dir::{application_default_path, ensure_dir},
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "flowtimer", version, long_about = None)]
#[command(about = "Flowtime focus timer. Work as long as you are focused, then take a proportional break", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_DATA_HOME/flowtimer or $HOME/.local/share/flowtimer"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log everything at trace level")]
    log: bool,
    #[arg(long, global = true, help = "Also print logs to stderr")]
    log_console: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start a session and control it from stdin")]
    Start {
        #[command(flatten)]
        command: StartCommand,
    },
    #[command(about = "Show focus and break totals for today")]
    Today {},
    #[command(about = "Show sessions and daily totals over a range of days")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
    #[command(about = "Show focus and break minutes per hour of a day")]
    Hourly {
        #[command(flatten)]
        command: HourlyCommand,
    },
    #[command(about = "Export every stored session to a csv file")]
    Export { file: PathBuf },
    #[command(about = "Import sessions from a csv file. Already stored sessions are skipped")]
    Import { file: PathBuf },
    #[command(about = "Show or change the saved settings")]
    Settings {
        #[command(flatten)]
        command: SettingsCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&ensure_dir(dir.join("logs"))?, logging_level, args.log_console)?;
    info!("Using application directory {dir:?}");

    match args.commands {
        Commands::Start { command } => process_start_command(command, &dir).await,
        Commands::Today {} => process_today_command(&dir).await,
        Commands::History { command } => process_history_command(command, &dir).await,
        Commands::Hourly { command } => process_hourly_command(command, &dir).await,
        Commands::Export { file } => process_export_command(&file, &dir).await,
        Commands::Import { file } => process_import_command(&file, &dir).await,
        Commands::Settings { command } => process_settings_command(command, &dir).await,
    }
}

fn open_storage(dir: &Path) -> Result<FileStorage> {
    Ok(FileStorage::new(dir.to_owned())?)
}
