//! CSV export of the CoinMarketCap category listing.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::CategorySummary;

pub const EXPORT_COLUMNS: [&str; 9] = [
    "id",
    "name",
    "num_tokens",
    "avg_price_change",
    "market_cap",
    "market_cap_change",
    "volume",
    "volume_change",
    "last_updated",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    pub sha256: String,
}

/// `zone_data_cmc_YYYYMMDD_HHMM.csv`
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("zone_data_cmc_{}.csv", at.format("%Y%m%d_%H%M"))
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn num_cell(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn row(c: &CategorySummary) -> String {
    let cells = [
        csv_field(&c.id),
        csv_field(&c.name),
        c.num_tokens.map(|n| n.to_string()).unwrap_or_default(),
        num_cell(c.avg_price_change),
        num_cell(c.market_cap),
        num_cell(c.market_cap_change),
        num_cell(c.volume),
        num_cell(c.volume_change),
        c.last_updated.map(|t| t.to_rfc3339()).unwrap_or_default(),
    ];
    cells.join(",")
}

pub fn write_csv(path: &Path, categories: &[CategorySummary]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", EXPORT_COLUMNS.join(","))?;
    for c in categories {
        writeln!(out, "{}", row(c))?;
    }
    out.flush()
}

pub fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Write `categories` into `dir` under a timestamped name and hash the result.
pub fn export_categories(
    dir: &Path,
    categories: &[CategorySummary],
    at: DateTime<Utc>,
) -> std::io::Result<ExportReport> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(at));
    write_csv(&path, categories)?;
    let sha256 = file_sha256(&path)?;
    Ok(ExportReport {
        path,
        rows: categories.len(),
        sha256,
    })
}
