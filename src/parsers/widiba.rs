//! Widiba XLSX statement parser.
//!
//! Statements carry a cover section of variable length before the data, so
//! the header row ("DATA CONT.", "DATA VAL.", "CAUSALE", "DESCRIZIONE",
//! "IMPORTO (€)") is located by scanning the first rows, and columns are
//! resolved by case-insensitive substring match rather than exact names.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::error::{ContoError, Result};
use crate::locale::{excel_serial_to_date, parse_amount, to_iso_date};
use crate::models::{Bank, CanonicalTransaction};

const HEADER_SCAN_ROWS: usize = 25;

pub fn parse(path: &Path) -> Result<Vec<CanonicalTransaction>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ContoError::Parse(format!("failed to open XLSX: {e}")))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ContoError::Parse("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ContoError::Parse(format!("failed to read sheet '{sheet}': {e}")))?;
    parse_range(&range)
}

struct Columns {
    date: usize,
    value_date: Option<usize>,
    causale: Option<usize>,
    descrizione: Option<usize>,
    importo: usize,
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        _ => String::new(),
    }
}

fn cell_date(cell: &Data) -> Option<String> {
    match cell {
        Data::Float(f) => Some(excel_serial_to_date(*f)),
        Data::Int(i) => Some(excel_serial_to_date(*i as f64)),
        Data::DateTime(dt) => Some(excel_serial_to_date(dt.as_f64())),
        Data::String(s) => to_iso_date(s),
        _ => None,
    }
}

fn cell_amount(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_amount(s),
        _ => None,
    }
}

fn resolve_columns(header: &[Data]) -> Result<Columns> {
    let (mut date, mut value_date, mut causale, mut descrizione, mut importo) =
        (None, None, None, None, None);
    for (idx, cell) in header.iter().enumerate() {
        let name = cell_text(cell).to_uppercase();
        if name.is_empty() {
            continue;
        }
        if name.contains("DATA CONT") {
            date = Some(idx);
        } else if name.contains("DATA VAL") {
            value_date = Some(idx);
        } else if name.contains("CAUSALE") {
            causale = Some(idx);
        } else if name.contains("DESCRIZIONE") {
            descrizione = Some(idx);
        } else if name.contains("IMPORTO") {
            importo = Some(idx);
        }
    }
    match (date, importo) {
        (Some(date), Some(importo)) => Ok(Columns {
            date,
            value_date,
            causale,
            descrizione,
            importo,
        }),
        _ => Err(ContoError::Parse(
            "required columns not found (DATA CONT. and IMPORTO are mandatory)".to_string(),
        )),
    }
}

pub fn parse_range(range: &Range<Data>) -> Result<Vec<CanonicalTransaction>> {
    let rows: Vec<&[Data]> = range.rows().collect();

    let header_idx = rows
        .iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| {
            row.iter()
                .any(|c| cell_text(c).to_uppercase().contains("DATA CONT"))
        })
        .ok_or_else(|| {
            ContoError::Parse(format!(
                "header row not found (no DATA CONT. column in the first {HEADER_SCAN_ROWS} rows)"
            ))
        })?;
    let cols = resolve_columns(rows[header_idx])?;

    let mut transactions = Vec::new();
    for row in rows.iter().skip(header_idx + 1) {
        let Some(date_cell) = row.get(cols.date) else {
            continue;
        };
        let Some(transaction_date) = cell_date(date_cell) else {
            continue;
        };

        let amount = row.get(cols.importo).and_then(cell_amount);
        let Some(amount) = amount else { continue };
        if amount == 0.0 {
            continue;
        }

        let value_date = cols
            .value_date
            .and_then(|i| row.get(i))
            .and_then(cell_date)
            .unwrap_or_else(|| transaction_date.clone());
        let causale = cols
            .causale
            .and_then(|i| row.get(i))
            .map(cell_text)
            .unwrap_or_default();
        let descrizione = cols
            .descrizione
            .and_then(|i| row.get(i))
            .map(cell_text)
            .unwrap_or_default();

        let description = [causale.trim(), descrizione.trim()]
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" - ");

        transactions.push(CanonicalTransaction {
            bank: Bank::Widiba,
            transaction_date,
            value_date,
            type_raw: causale.trim().to_string(),
            description: if description.is_empty() {
                "N/A".to_string()
            } else {
                description
            },
            amount_in: if amount > 0.0 { amount.abs() } else { 0.0 },
            amount_out: if amount < 0.0 { amount.abs() } else { 0.0 },
            balance: None,
            source_file: None,
        });
    }
    Ok(transactions)
}
