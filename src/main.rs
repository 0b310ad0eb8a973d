mod anomaly;
mod categorizer;
mod cleaner;
mod cli;
mod db;
mod error;
mod fmt;
mod models;
mod pipeline;
mod reports;
mod server;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ReportCommands, RulesCommands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spendlens=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Run { file, categories } => cli::run::run(&file, categories.as_deref()),
        Commands::Report { command } => match command {
            ReportCommands::Breakdown { json } => cli::report::breakdown(json),
            ReportCommands::Trend { json } => cli::report::trend(json),
            ReportCommands::Anomalies { json } => cli::report::anomalies(json),
            ReportCommands::Transactions { json } => cli::report::transactions(json),
        },
        Commands::Rules { command } => match command {
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Test { description } => cli::rules::test(&description),
        },
        Commands::Serve { addr } => cli::serve::run(addr),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
