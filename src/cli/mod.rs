pub mod process;
pub mod status;

use std::{env, path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_previous_daemons, restart_daemon};
use status::show_status;
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::start_daemon,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Playtally", version, long_about = None)]
#[command(about = "Counts how long your games have actually been running", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(about = "Show accumulated playtime per game")]
    Status {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
        #[arg(long, default_value_t = 5, help = "Seconds between process-list samples")]
        interval: u64,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Init {} => {
            restart_daemon()?;
            Ok(())
        }
        Commands::Stop {} => {
            let process_name = env::current_exe()?;
            kill_previous_daemons(&process_name);
            Ok(())
        }
        Commands::Serve { dir, interval } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;
            start_daemon(app_dir, Duration::from_secs(interval)).await
        }
        Commands::Status { dir } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            show_status(&app_dir)
        }
    }
}
