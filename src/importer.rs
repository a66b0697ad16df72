//! Per-file import pipeline: parse, classify, deduplicate, persist,
//! finalize the batch. Files are processed sequentially and in isolation; a
//! fatal error in one file never aborts its siblings, and nothing from a
//! file is persisted until parsing, classification and dedup for the whole
//! file have completed.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::classifier::ClassificationEngine;
use crate::dedup::{check_duplicates, create_import_batch, save_transactions, update_import_batch};
use crate::error::{ContoError, Result};
use crate::models::Bank;
use crate::parsers::{detect_bank, parse_statement};

#[derive(Debug)]
pub enum FileOutcome {
    Success {
        bank: Bank,
        batch_id: i64,
        total: usize,
        imported: usize,
        duplicates: usize,
        errors: usize,
    },
    /// Parsed cleanly but contained no transactions.
    Warning { bank: Bank, message: String },
    /// Structural failure; nothing was imported from this file.
    Error { message: String },
}

#[derive(Debug)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

/// Import every file in order, collecting one outcome per file.
pub fn import_files(
    conn: &Connection,
    engine: &ClassificationEngine<'_>,
    files: &[PathBuf],
    bank_override: Option<Bank>,
) -> Vec<FileReport> {
    files
        .iter()
        .map(|path| FileReport {
            name: file_name(path),
            outcome: import_file(conn, engine, path, bank_override)
                .unwrap_or_else(|e| FileOutcome::Error { message: e.to_string() }),
        })
        .collect()
}

fn import_file(
    conn: &Connection,
    engine: &ClassificationEngine<'_>,
    path: &Path,
    bank_override: Option<Bank>,
) -> Result<FileOutcome> {
    let filename = file_name(path);
    let bank = bank_override
        .or_else(|| detect_bank(&filename))
        .ok_or_else(|| {
            ContoError::UnknownBank(format!(
                "could not detect bank from filename {filename:?}; pass --bank"
            ))
        })?;

    let mut transactions = parse_statement(bank, path)?;
    if transactions.is_empty() {
        return Ok(FileOutcome::Warning {
            bank,
            message: "no transactions found in file".to_string(),
        });
    }
    for tx in &mut transactions {
        tx.source_file = Some(filename.clone());
    }
    let total = transactions.len();

    let classified = engine.classify(transactions)?;
    let checked = check_duplicates(conn, classified)?;

    let batch_id = create_import_batch(conn, bank, &filename, total)?;
    let results = save_transactions(conn, &checked, batch_id);
    update_import_batch(conn, batch_id, &results)?;

    Ok(FileOutcome::Success {
        bank,
        batch_id,
        total,
        imported: results.imported,
        duplicates: results.duplicates,
        errors: results.errors,
    })
}
