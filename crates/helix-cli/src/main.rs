mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::commands::GlobalOptions;
use crate::error::{CliError, Result};
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("🚀 helixkit CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let globals = GlobalOptions {
        dry_run: cli.dry_run,
        threads: cli.threads,
        program_dir: cli.program_dir,
    };

    let command_result = match cli.command {
        Commands::Segment(args) => {
            info!("Dispatching to 'segment' command.");
            commands::segment::run(args, &globals)
        }
        Commands::Symmetrize(args) => {
            info!("Dispatching to 'symmetrize' command.");
            commands::symmetrize::run(args, &globals)
        }
        Commands::AssignAngles(args) => {
            info!("Dispatching to 'assign-angles' command.");
            commands::assign_angles::run(args)
        }
        Commands::Box(args) => {
            info!("Dispatching to 'box' command.");
            commands::boxer::run(args, &globals)
        }
        Commands::InitialVolume(args) => {
            info!("Dispatching to 'initial-volume' command.");
            commands::initial_volume::run(args, &globals)
        }
        Commands::Refine(args) => {
            info!("Dispatching to 'refine' command.");
            commands::refine::run(args, &globals)
        }
    };

    match &command_result {
        Ok(_) => {
            info!("✅ Command completed successfully.");
            println!("✅ Command completed successfully.");
        }
        Err(e) => {
            error!("❌ Command failed: {}", e);
            eprintln!("❌ Command failed: {}", e);
        }
    }

    command_result
}
