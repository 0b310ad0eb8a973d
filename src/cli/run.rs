use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::{Result, SpendError};
use crate::fmt::amount;
use crate::models::Transaction;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::settings::{load_settings, shellexpand_path};

const PREVIEW_ROWS: usize = 10;
const TOP_ANOMALIES: usize = 5;

fn transaction_table(rows: &[&Transaction]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Transaction Name", "Amount", "Category"]);
    for t in rows {
        table.add_row(vec![
            Cell::new(t.date),
            Cell::new(t.description.as_deref().unwrap_or("")),
            Cell::new(amount(t.amount)),
            Cell::new(&t.category),
        ]);
    }
    table
}

pub fn run(file: &str, categories: Option<&str>) -> Result<()> {
    let file_path = PathBuf::from(file);
    if !file_path.is_file() {
        return Err(SpendError::InputNotFound(file_path.display().to_string()));
    }

    let mut settings = load_settings()?;
    if let Some(path) = categories {
        settings.categories_file = Some(shellexpand_path(path));
    }
    let config = PipelineConfig::load(&settings)?;

    std::fs::create_dir_all(settings.data_path())?;
    let mut conn = get_connection(&settings.db_path())?;
    let out = Pipeline::new(config).run_file(&file_path, &mut conn)?;
    let report = &out.report;

    println!(
        "{} rows read, {} kept, {} dropped",
        report.rows_read,
        report.rows_kept,
        report.rejected.len()
    );
    for rejected in &report.rejected {
        println!("  {} line {}: {}", "dropped".yellow(), rejected.line, rejected.reason);
    }

    println!("\nTotal anomalies detected: {}", report.anomalies);
    if report.anomalies > 0 {
        let mut flagged: Vec<&Transaction> = out.transactions.iter().filter(|t| t.is_anomaly).collect();
        flagged.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        flagged.truncate(TOP_ANOMALIES);
        println!("{}\n{}", "Top anomalies to review".red().bold(), transaction_table(&flagged));
    }

    let preview: Vec<&Transaction> = out.transactions.iter().take(PREVIEW_ROWS).collect();
    println!("\nFirst rows\n{}", transaction_table(&preview));

    println!(
        "\n{} {} transactions written to {}",
        "Saved".green().bold(),
        report.rows_kept,
        settings.db_path().display()
    );
    Ok(())
}
