// src/campaign/aggregate.rs

//! Gather every task's `res.csv` into one campaign table.
//!
//! Headers from different parsers are unioned in order of first
//! appearance; missing cells are left empty. Each row gets an
//! `instance_name` column holding its task directory name. A file with a
//! row wider than its header is skipped whole.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{error, info, warn};

use crate::engine::CampaignHook;
use crate::exec::status::write_atomic;

pub const RESULT_FILE: &str = "res.csv";
pub const INSTANCE_COLUMN: &str = "instance_name";
pub const LAST_RESULTS_LINK: &str = "last_results.csv";

/// Post-campaign hook writing the gathered table next to the task
/// directories.
#[derive(Debug, Clone)]
pub struct CsvAggregation {
    pub file_name: String,
    pub link_last: bool,
}

impl CsvAggregation {
    pub fn new(link_last: bool) -> Self {
        Self {
            file_name: "parsed_results.csv".to_string(),
            link_last,
        }
    }
}

impl CampaignHook for CsvAggregation {
    fn name(&self) -> &str {
        "csv-aggregation"
    }

    fn run(&self, output_root: &Path) -> Result<()> {
        let dest = output_root.join(&self.file_name);
        gather_results(output_root, &dest, self.link_last)?;
        Ok(())
    }
}

struct Table {
    header: Vec<String>,
    rows: Vec<Vec<(usize, String)>>,
}

impl Table {
    fn column(&mut self, name: &str) -> usize {
        match self.header.iter().position(|h| h == name) {
            Some(i) => i,
            None => {
                self.header.push(name.to_string());
                self.header.len() - 1
            }
        }
    }
}

/// Aggregate and return the number of data rows written.
///
/// Writes nothing (and returns 0) when no task produced a row.
pub fn gather_results(raw_dir: &Path, dest_csv: &Path, link_last: bool) -> Result<usize> {
    info!(dir = %raw_dir.display(), "aggregating results");

    let mut dirs: Vec<PathBuf> = fs::read_dir(raw_dir)
        .with_context(|| format!("reading {}", raw_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let mut table = Table {
        header: Vec::new(),
        rows: Vec::new(),
    };

    for dir in dirs {
        let res = dir.join(RESULT_FILE);
        if !res.exists() {
            error!(dir = %dir.display(), "{RESULT_FILE} not found, skipping");
            continue;
        }
        let text = match fs::read_to_string(&res) {
            Ok(t) => t,
            Err(e) => {
                error!(file = %res.display(), error = %e, "cannot read results, skipping");
                continue;
            }
        };
        let instance = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Err(e) = append_file(&mut table, &text, &instance) {
            error!(file = %res.display(), error = %e, "malformed results, skipping");
        }
    }

    if table.rows.is_empty() {
        warn!("no results were aggregated");
        return Ok(0);
    }

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&table.header)?;
    for row in &table.rows {
        let mut cells = vec![""; table.header.len()];
        for (col, value) in row {
            cells[*col] = value.as_str();
        }
        writer.write_record(&cells)?;
    }
    let out = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing aggregated table: {}", e.error()))?;

    if let Some(parent) = dest_csv.parent() {
        fs::create_dir_all(parent)?;
    }
    write_atomic(dest_csv, &out)
        .with_context(|| format!("writing {}", dest_csv.display()))?;
    info!(rows = table.rows.len(), file = %dest_csv.display(), "aggregated results written");

    if link_last {
        if let Err(e) = link_last_results(dest_csv) {
            error!(error = %e, "failed to update {LAST_RESULTS_LINK} link");
        }
    }
    Ok(table.rows.len())
}

/// Add one task's rows to `table`. Nothing is added when the file is
/// malformed.
fn append_file(table: &mut Table, text: &str, instance: &str) -> Result<()> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Ok(());
    }

    let records: Vec<StringRecord> = reader.records().collect::<csv::Result<_>>()?;
    if let Some(wide) = records.iter().find(|r| r.len() > header.len()) {
        bail!(
            "row with {} fields under a {}-column header{}",
            wide.len(),
            header.len(),
            wide.position()
                .map(|p| format!(" (line {})", p.line()))
                .unwrap_or_default()
        );
    }

    let cols: Vec<usize> = header.iter().map(|name| table.column(name)).collect();
    let instance_col = table.column(INSTANCE_COLUMN);

    for record in records {
        let mut row: Vec<(usize, String)> = record
            .iter()
            .zip(cols.iter())
            .filter(|(_, col)| **col != instance_col)
            .map(|(value, col)| (*col, value.to_string()))
            .collect();
        row.push((instance_col, instance.to_string()));
        table.rows.push(row);
    }
    Ok(())
}

#[cfg(unix)]
fn link_last_results(target: &Path) -> Result<()> {
    let home = directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .context("cannot determine home directory")?;
    let link = home.join(LAST_RESULTS_LINK);
    if link.symlink_metadata().is_ok() {
        fs::remove_file(&link).with_context(|| format!("removing {}", link.display()))?;
    }
    let target = target.canonicalize()?;
    std::os::unix::fs::symlink(&target, &link)
        .with_context(|| format!("linking {} -> {}", link.display(), target.display()))?;
    info!(link = %link.display(), "latest results link updated");
    Ok(())
}

#[cfg(not(unix))]
fn link_last_results(_target: &Path) -> Result<()> {
    Ok(())
}
