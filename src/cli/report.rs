use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::db::{get_connection, load_all};
use crate::error::Result;
use crate::fmt::amount;
use crate::reports;
use crate::settings::load_settings;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn signed(val: f64) -> Cell {
    if val < 0.0 {
        Cell::new(amount(val).red())
    } else {
        Cell::new(amount(val).green())
    }
}

pub fn breakdown(json: bool) -> Result<()> {
    let settings = load_settings()?;
    let conn = get_connection(&settings.db_path())?;
    let items = reports::category_breakdown(&conn, settings.breakdown_threshold)?;
    if json {
        return print_json(&items);
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Total"]);
    for item in &items {
        table.add_row(vec![Cell::new(&item.category), signed(item.total_amount)]);
    }
    println!("Category Breakdown\n{table}");
    Ok(())
}

pub fn trend(json: bool) -> Result<()> {
    let settings = load_settings()?;
    let conn = get_connection(&settings.db_path())?;
    let trend = reports::monthly_trend(&conn)?;
    if json {
        return print_json(&trend);
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "Net Flow"]);
    for (label, value) in trend.labels.iter().zip(&trend.data) {
        table.add_row(vec![Cell::new(label), signed(*value)]);
    }
    println!("Monthly Net Flow\n{table}");
    Ok(())
}

pub fn anomalies(json: bool) -> Result<()> {
    let settings = load_settings()?;
    let conn = get_connection(&settings.db_path())?;
    let rows = reports::anomalies(&conn)?;
    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No anomalies flagged.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Date", "Transaction Name", "Amount", "Category"]);
    for row in &rows {
        table.add_row(vec![
            Cell::new(row.date),
            Cell::new(row.description.as_deref().unwrap_or("")),
            signed(row.amount),
            Cell::new(&row.category),
        ]);
    }
    println!("{}\n{table}", "Anomalies".bold());
    Ok(())
}

pub fn transactions(json: bool) -> Result<()> {
    let settings = load_settings()?;
    let conn = get_connection(&settings.db_path())?;
    let rows = load_all(&conn)?;
    if json {
        return print_json(&rows);
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Transaction Name", "Amount", "Category", ""]);
    for t in &rows {
        table.add_row(vec![
            Cell::new(t.date),
            Cell::new(t.description.as_deref().unwrap_or("")),
            signed(t.amount),
            Cell::new(&t.category),
            Cell::new(if t.is_anomaly { "!" } else { "" }),
        ]);
    }
    println!("Transactions\n{table}");
    println!("{} rows", rows.len());
    Ok(())
}
