use std::process::ExitCode;

use clap::Parser;
use evcs_cli::{Cli, Commands};
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install logger: {err}");
    }

    let result = match &cli.command {
        Commands::Scenarios { command } => commands::scenarios::handle(command),
        Commands::Maps { command } => commands::maps::handle(command),
        Commands::Candidates { command } => commands::candidates::handle(command),
        Commands::Optimize(args) => commands::optimize::handle(args),
        Commands::Batch { command } => commands::batch::handle(command),
        Commands::Merge { dir, out } => commands::merge::handle(dir, out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
