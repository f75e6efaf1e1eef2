// =============================================================================
// Signal Audit Log — append-only CSV
// =============================================================================
//
// Every significant signal evaluation is appended to a CSV file so decisions
// can be reviewed after the fact. The header row is written once when the
// file is created; rows are appended thereafter and never rewritten.
//
// Field quoting: only the free-text reason column can contain commas, so it
// is quoted with embedded quotes doubled.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::warn;

use crate::events::round2;
use crate::types::{SignalKind, TrendLabel};

const HEADER: &str =
    "timestamp,symbol,trend_fast,trend_main,roc_signal,volume_confirmed,suggestion,reason,entry_price,exit_price\n";

/// One audited evaluation: the trend context, the latest rate-of-change
/// classification, and the final suggestion with its prices.
#[derive(Debug, Clone)]
pub struct AuditRow {
    pub trend_fast: TrendLabel,
    pub trend_main: TrendLabel,
    pub roc_signal: Option<SignalKind>,
    pub volume_confirmed: bool,
    pub suggestion: SignalKind,
    pub reason: String,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
}

/// Append-only CSV writer for emitted signals.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file (with header) on first use.
    pub fn record(&self, symbol: &str, row: &AuditRow) -> Result<()> {
        let is_new = !self.path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open audit log at {}", self.path.display()))?;

        if is_new {
            file.write_all(HEADER.as_bytes())
                .context("failed to write audit log header")?;
        }

        let line = format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            Utc::now().to_rfc3339(),
            symbol,
            row.trend_fast,
            row.trend_main,
            row.roc_signal.map(|k| k.to_string()).unwrap_or_default(),
            row.volume_confirmed,
            row.suggestion,
            quote(&row.reason),
            fmt_price(row.entry_price),
            fmt_price(row.exit_price),
        );

        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to audit log at {}", self.path.display()))
    }

    /// Record, downgrading failures to a warning. Audit writes must never
    /// take down the evaluation path.
    pub fn record_best_effort(&self, symbol: &str, row: &AuditRow) {
        if let Err(e) = self.record(symbol, row) {
            warn!(error = %e, symbol, "audit log write failed");
        }
    }
}

fn fmt_price(v: Option<f64>) -> String {
    match v.filter(|x| x.is_finite()) {
        Some(x) => round2(x).to_string(),
        None => String::new(),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
