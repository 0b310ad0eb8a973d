use crate::db::{count_transactions, get_connection};
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let db_path = settings.db_path();
    let categories_path = settings.categories_path();

    println!("Data dir:     {}", settings.data_dir);
    println!("Database:     {}", db_path.display());
    println!(
        "Categories:   {}{}",
        categories_path.display(),
        if categories_path.exists() { "" } else { " (missing)" }
    );

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:      {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let counts = count_transactions(&conn)?;
        println!();
        println!("Transactions: {}", counts.transactions);
        println!("Anomalies:    {}", counts.anomalies);
    } else {
        println!();
        println!("Database not found. Run `spendlens init` to set up.");
    }

    Ok(())
}
