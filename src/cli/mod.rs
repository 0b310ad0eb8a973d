pub mod init;
pub mod report;
pub mod rules;
pub mod run;
pub mod serve;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "spendlens",
    about = "Categorize bank-transaction CSV exports and flag unusual spending."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory, initialize the database and a starter category map.
    Init {
        /// Path for spendlens data (default: ~/.local/share/spendlens)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Clean, categorize and score a CSV export, replacing the stored dataset.
    Run {
        /// CSV file with Date, Transaction Name and Amount columns
        #[arg(default_value = "Transactions.csv")]
        file: String,
        /// Category map to use instead of the configured one
        #[arg(long)]
        categories: Option<String>,
    },
    /// Show aggregates over the stored dataset.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Inspect the category map.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Serve the dashboard JSON API and the upload endpoint.
    Serve {
        /// Listen address (default from settings: 127.0.0.1:5000)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Show paths and dataset counts.
    Status,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Totals per category, noise-level categories left out.
    Breakdown {
        #[arg(long)]
        json: bool,
    },
    /// Net flow per month.
    Trend {
        #[arg(long)]
        json: bool,
    },
    /// Transactions flagged as unusual.
    Anomalies {
        #[arg(long)]
        json: bool,
    },
    /// Every stored transaction, in input order.
    Transactions {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List categories and keywords in match order.
    List,
    /// Show which category a description would get.
    Test {
        /// Transaction description to classify
        description: String,
    },
}
