use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{parse_stored_date, table_exists};
use crate::error::Result;

/// Categories whose absolute total is at or below this are left out of the breakdown.
pub const DEFAULT_BREAKDOWN_THRESHOLD: f64 = 100.0;

// ---------------------------------------------------------------------------
// Category breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownItem {
    pub category: String,
    pub total_amount: f64,
}

pub fn category_breakdown(conn: &Connection, threshold: f64) -> Result<Vec<BreakdownItem>> {
    if !table_exists(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT category, SUM(amount) AS total_amount FROM transactions_data \
         GROUP BY category HAVING ABS(SUM(amount)) > ?1 \
         ORDER BY total_amount DESC",
    )?;
    let rows = stmt
        .query_map([threshold], |row| {
            Ok(BreakdownItem {
                category: row.get(0)?,
                total_amount: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Monthly trend
// ---------------------------------------------------------------------------

/// Net flow per calendar month as parallel sequences, oldest month first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyTrend {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

pub fn monthly_trend(conn: &Connection) -> Result<MonthlyTrend> {
    if !table_exists(conn)? {
        return Ok(MonthlyTrend::default());
    }
    let mut stmt = conn.prepare(
        "SELECT substr(date, 1, 7) AS year_month, SUM(amount) AS net_flow \
         FROM transactions_data GROUP BY year_month ORDER BY year_month",
    )?;
    let raw: Vec<(String, f64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let (labels, data) = raw.into_iter().unzip();
    Ok(MonthlyTrend { labels, data })
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRow {
    pub date: NaiveDate,
    pub description: Option<String>,
    pub amount: f64,
    pub category: String,
}

pub fn anomalies(conn: &Connection) -> Result<Vec<AnomalyRow>> {
    if !table_exists(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(
        "SELECT date, description, amount, category FROM transactions_data \
         WHERE is_anomaly = 1 ORDER BY amount DESC, id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let date: String = row.get(0)?;
            Ok(AnomalyRow {
                date: parse_stored_date(0, &date)?,
                description: row.get(1)?,
                amount: row.get(2)?,
                category: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dashboard {
    pub breakdown: Vec<BreakdownItem>,
    pub monthly: MonthlyTrend,
    pub anomalies: Vec<AnomalyRow>,
}

/// All three aggregates read from one snapshot, so a concurrent `save` shows
/// up either in every part or in none.
pub fn dashboard(conn: &Connection, threshold: f64) -> Result<Dashboard> {
    let tx = conn.unchecked_transaction()?;
    let dashboard = Dashboard {
        breakdown: category_breakdown(&tx, threshold)?,
        monthly: monthly_trend(&tx)?,
        anomalies: anomalies(&tx)?,
    };
    tx.commit()?;
    Ok(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db, save};
    use crate::models::Transaction;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn seed_transactions(conn: &mut Connection) {
        let rows: &[(&str, &str, f64, &str, bool)] = &[
            ("2024-02-10", "STARBUCKS", -20.0, "Coffee", false),
            ("2024-01-05", "STARBUCKS", -30.0, "Coffee", false),
            ("2024-01-06", "RENT", -1500.0, "Housing", true),
            ("2024-02-06", "RENT", -1500.0, "Housing", false),
            ("2024-01-31", "PAYROLL", 4000.0, "Income", true),
            ("2023-12-15", "GIFT", 150.0, "Miscellaneous", false),
            ("2024-02-11", "REFUND", 101.0, "Miscellaneous", true),
        ];
        let txns: Vec<Transaction> = rows
            .iter()
            .map(|(date, desc, amount, category, is_anomaly)| Transaction {
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                description: Some(desc.to_string()),
                amount: *amount,
                category: category.to_string(),
                is_anomaly: *is_anomaly,
            })
            .collect();
        save(conn, &txns).unwrap();
    }

    #[test]
    fn test_breakdown_filters_small_totals_and_sorts_desc() {
        let (_dir, mut conn) = test_db();
        seed_transactions(&mut conn);
        let items = category_breakdown(&conn, DEFAULT_BREAKDOWN_THRESHOLD).unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.category.as_str()).collect();
        assert_eq!(names, vec!["Income", "Miscellaneous", "Housing"]);
        assert_eq!(items[0].total_amount, 4000.0);
        assert_eq!(items[1].total_amount, 251.0);
        assert_eq!(items[2].total_amount, -3000.0);
        // Coffee sums to -50
        assert!(!names.contains(&"Coffee"));
    }

    #[test]
    fn test_breakdown_threshold_is_exclusive() {
        let (_dir, mut conn) = test_db();
        seed_transactions(&mut conn);
        let items = category_breakdown(&conn, 251.0).unwrap();
        assert!(items.iter().all(|i| i.category != "Miscellaneous"));
        let items = category_breakdown(&conn, 0.0).unwrap();
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_monthly_trend_ascending_unique() {
        let (_dir, mut conn) = test_db();
        seed_transactions(&mut conn);
        let trend = monthly_trend(&conn).unwrap();
        assert_eq!(trend.labels, vec!["2023-12", "2024-01", "2024-02"]);
        assert_eq!(trend.data, vec![150.0, 2470.0, -1419.0]);
        assert!(trend.labels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_anomalies_sorted_by_amount_desc() {
        let (_dir, mut conn) = test_db();
        seed_transactions(&mut conn);
        let rows = anomalies(&conn).unwrap();
        let amounts: Vec<f64> = rows.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![4000.0, 101.0, -1500.0]);
        assert_eq!(rows[0].category, "Income");
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
    }

    #[test]
    fn test_queries_on_empty_dataset() {
        let (_dir, conn) = test_db();
        assert!(category_breakdown(&conn, 100.0).unwrap().is_empty());
        assert_eq!(monthly_trend(&conn).unwrap(), MonthlyTrend::default());
        assert!(anomalies(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_queries_without_table() {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("fresh.db")).unwrap();
        assert_eq!(dashboard(&conn, 100.0).unwrap(), Dashboard::default());
    }

    #[test]
    fn test_dashboard_json_shape() {
        let (_dir, mut conn) = test_db();
        seed_transactions(&mut conn);
        let json = serde_json::to_value(dashboard(&conn, 100.0).unwrap()).unwrap();
        assert_eq!(json["breakdown"][0]["category"], "Income");
        assert_eq!(json["breakdown"][0]["total_amount"], 4000.0);
        assert_eq!(json["monthly"]["labels"][0], "2023-12");
        assert_eq!(json["anomalies"][0]["date"], "2024-01-31");
        assert_eq!(json["anomalies"][0]["description"], "PAYROLL");
    }

    fn month_batch(month: u32, category: &str) -> Vec<Transaction> {
        (0..300u32)
            .map(|i| Transaction {
                date: NaiveDate::from_ymd_opt(2024, month, i % 28 + 1).unwrap(),
                description: Some(format!("{category} {i}")),
                amount: -150.0 - i as f64,
                category: category.to_string(),
                is_anomaly: i % 50 == 0,
            })
            .collect()
    }

    #[test]
    fn test_dashboard_reads_one_dataset_while_saves_commit() {
        let (dir, mut writer) = test_db();
        let jan = month_batch(1, "Alpha");
        let feb = month_batch(2, "Beta");
        save(&mut writer, &jan).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let swapper = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let mut use_jan = false;
                while !stop.load(Ordering::Relaxed) {
                    save(&mut writer, if use_jan { &jan } else { &feb }).unwrap();
                    use_jan = !use_jan;
                }
            })
        };

        let reader = get_connection(&dir.path().join("test.db")).unwrap();
        for _ in 0..300 {
            let d = dashboard(&reader, 100.0).unwrap();
            assert_eq!(d.monthly.labels.len(), 1, "months: {:?}", d.monthly.labels);
            let expected = if d.monthly.labels[0] == "2024-01" { "Alpha" } else { "Beta" };
            assert_eq!(d.breakdown.len(), 1);
            assert_eq!(d.breakdown[0].category, expected);
            assert_eq!(d.anomalies.len(), 6);
            assert!(d.anomalies.iter().all(|a| a.category == expected));
        }

        stop.store(true, Ordering::Relaxed);
        swapper.join().unwrap();
    }
}
