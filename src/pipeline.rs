use std::io::Read;
use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::anomaly::{DetectorSettings, IsolationForest};
use crate::categorizer::{assign_category, CategoryMap};
use crate::cleaner::clean;
use crate::db;
use crate::error::{Result, SpendError};
use crate::models::{RejectedRow, Transaction};
use crate::settings::Settings;

/// Everything a run needs, loaded once up front and immutable for the run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub categories: CategoryMap,
    pub detector: DetectorSettings,
}

impl PipelineConfig {
    pub fn load(settings: &Settings) -> Result<Self> {
        let categories = CategoryMap::load(&settings.categories_path())?;
        if categories.is_empty() {
            warn!("category map is empty; every described row will be Miscellaneous");
        }
        Ok(Self {
            categories,
            detector: settings.detector,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rejected: Vec<RejectedRow>,
    pub anomalies: usize,
    /// Row counts per category, in first-seen order.
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub transactions: Vec<Transaction>,
    pub report: PipelineReport,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Clean, categorize and score `reader` without touching storage.
    pub fn process<R: Read>(&self, reader: R) -> Result<RunOutput> {
        let cleaned = clean(reader)?;
        if cleaned.rows.is_empty() {
            return Err(SpendError::NoValidRows(cleaned.rejected.len()));
        }
        if !cleaned.rejected.is_empty() {
            warn!(count = cleaned.rejected.len(), "rows dropped during cleaning");
        }

        let magnitudes: Vec<f64> = cleaned.rows.iter().map(|r| r.amount.abs()).collect();
        let flags = IsolationForest::new(self.config.detector).fit_predict(&magnitudes);

        let mut categories: Vec<CategoryCount> = Vec::new();
        let transactions: Vec<Transaction> = cleaned
            .rows
            .into_iter()
            .zip(flags)
            .map(|(row, is_anomaly)| {
                let category =
                    assign_category(row.description.as_deref(), &self.config.categories).to_string();
                match categories.iter_mut().find(|c| c.category == category) {
                    Some(c) => c.count += 1,
                    None => categories.push(CategoryCount {
                        category: category.clone(),
                        count: 1,
                    }),
                }
                Transaction {
                    date: row.date,
                    description: row.description,
                    amount: row.amount,
                    category,
                    is_anomaly,
                }
            })
            .collect();

        let anomalies = transactions.iter().filter(|t| t.is_anomaly).count();
        info!(rows = transactions.len(), anomalies, "categorized and scored");

        let report = PipelineReport {
            rows_read: cleaned.rows_read,
            rows_kept: transactions.len(),
            rejected: cleaned.rejected,
            anomalies,
            categories,
        };
        Ok(RunOutput {
            transactions,
            report,
        })
    }

    /// Full run: process `reader` and replace the persisted dataset. On any
    /// error nothing is written.
    pub fn run<R: Read>(&self, reader: R, conn: &mut Connection) -> Result<RunOutput> {
        let output = self.process(reader)?;
        db::save(conn, &output.transactions)?;
        Ok(output)
    }

    pub fn run_file(&self, path: &Path, conn: &mut Connection) -> Result<RunOutput> {
        if !path.is_file() {
            return Err(SpendError::InputNotFound(path.display().to_string()));
        }
        info!(file = %path.display(), "starting pipeline run");
        let file = std::fs::File::open(path)?;
        self.run(std::io::BufReader::new(file), conn)
    }
}
