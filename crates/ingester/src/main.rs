//! Ingester launcher
//!
//! Copies new media from the configured source folders into the next
//! `raw <N>` folder of a project and marks the originals as copied.
//!
//! Exit codes: 0 on success or a deliberate halt, 1 on a fatal error
//! (including a run whose counter could not be saved), 2 when the run
//! finished but some files were not ingested.

use clap::{Parser, Subcommand};
use console::style;
use ingester::IngestError;
use ingester_logging::{init_logging, LogConfig};
use std::process::ExitCode;
use tracing::info;

mod cli;

use cli::CommandStatus;

#[derive(Parser, Debug)]
#[command(
    name = "ingester",
    version,
    about = "Ingest media from cards and cameras into numbered project folders"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy new source files into the next raw folder of a project (default)
    Ingest(cli::ingest::IngestArgs),

    /// List projects, most recently modified first
    Projects(cli::projects::ProjectsArgs),

    /// Create a project, seeded from templateDir when configured
    NewProject(cli::new_project::NewProjectArgs),

    /// Show home, config and log locations
    Config(cli::config::ConfigArgs),
}

fn command_wants_json(cmd: &Commands) -> bool {
    match cmd {
        Commands::Ingest(args) => args.json,
        Commands::Projects(args) => args.json,
        Commands::Config(args) => args.json,
        Commands::NewProject(_) => false,
    }
}

fn run_command(command: Commands) -> anyhow::Result<CommandStatus> {
    match command {
        Commands::Ingest(args) => {
            let prompter = cli::prompt::TerminalPrompter::new();
            cli::ingest::run(args, &prompter)
        }
        Commands::Projects(args) => cli::projects::run(args),
        Commands::NewProject(args) => cli::new_project::run(args),
        Commands::Config(args) => cli::config::run(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Ingest(cli::ingest::IngestArgs::default()));
    let json_mode = command_wants_json(&command);

    if let Err(e) = init_logging(LogConfig {
        app_name: "ingester",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", e);
    }

    match run_command(command) {
        Ok(CommandStatus::Success) | Ok(CommandStatus::Halted) => ExitCode::SUCCESS,
        Ok(CommandStatus::Partial) => ExitCode::from(2),
        Ok(CommandStatus::Failed) => ExitCode::from(1),
        Err(err) => {
            if let Some(ingest_err) = err.downcast_ref::<IngestError>() {
                if ingest_err.is_clean_halt() {
                    if json_mode {
                        cli::error::print_json_halt(ingest_err);
                    } else {
                        println!("{}", style(ingest_err).red());
                    }
                    return ExitCode::SUCCESS;
                }
            }
            info!(error = %format!("{:#}", err), "Command failed");
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprint!("{}", cli::error::render(&err));
            }
            ExitCode::from(1)
        }
    }
}
