//! RelaxBanking statement parser.
//!
//! Exports are tab-separated text in ISO-8859-1, usually mislabeled with an
//! .xls extension. Columns: Data contabile, Data valuta, Importo,
//! Descrizione, Note. Dates are DD/MM/YYYY, amounts Italian-formatted.

use std::path::Path;

use colored::Colorize;

use crate::error::{ContoError, Result};
use crate::locale::{parse_italian_amount, parse_italian_date};
use crate::models::{Bank, CanonicalTransaction};

/// Hard cap on the stored description, to fit the storage column. Longer
/// descriptions are cut to exactly this length, marker included.
pub const DESCRIPTION_MAX: usize = 490;
const TRUNCATION_MARKER: &str = "...";

/// ISO-8859-1 maps every byte to the same Unicode code point, so decoding is
/// a straight byte-to-char widening.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn truncate_description(desc: &str) -> String {
    if desc.chars().count() <= DESCRIPTION_MAX {
        return desc.to_string();
    }
    let kept: String = desc.chars().take(DESCRIPTION_MAX - TRUNCATION_MARKER.len()).collect();
    format!("{kept}{TRUNCATION_MARKER}")
}

pub fn parse(path: &Path) -> Result<Vec<CanonicalTransaction>> {
    let bytes = std::fs::read(path)?;
    parse_text(&decode_latin1(&bytes))
}

pub fn parse_text(text: &str) -> Result<Vec<CanonicalTransaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let (date_col, importo_col) = match (col("data contabile"), col("importo")) {
        (Some(d), Some(i)) => (d, i),
        _ => {
            return Err(ContoError::Parse(
                "required columns not found (Data contabile and Importo are mandatory)".to_string(),
            ))
        }
    };
    let value_date_col = col("data valuta");
    let descrizione_col = col("descrizione");
    let note_col = col("note");
    if descrizione_col.is_none() && note_col.is_none() {
        return Err(ContoError::Parse(
            "required columns not found (need at least one of Descrizione/Note)".to_string(),
        ));
    }

    let mut transactions = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{} skipping malformed row {}: {e}", "warning:".yellow(), line + 2);
                continue;
            }
        };
        let field = |i: Option<usize>| i.and_then(|i| record.get(i)).unwrap_or("").trim();

        let raw_date = field(Some(date_col));
        let raw_amount = field(Some(importo_col));
        if raw_date.is_empty() || raw_amount.is_empty() {
            continue;
        }

        let Some(transaction_date) = parse_italian_date(raw_date) else {
            eprintln!("{} skipping row {} with unparsable date {raw_date:?}", "warning:".yellow(), line + 2);
            continue;
        };
        let amount = match parse_italian_amount(raw_amount) {
            Some(a) if a != 0.0 => a,
            Some(_) => continue,
            None => {
                eprintln!("{} skipping row {} with unparsable amount {raw_amount:?}", "warning:".yellow(), line + 2);
                continue;
            }
        };

        let value_date = value_date_col
            .and_then(|i| record.get(i))
            .and_then(|v| parse_italian_date(v.trim()))
            .unwrap_or_else(|| transaction_date.clone());

        let descrizione = field(descrizione_col);
        let note = field(note_col);
        let description = [descrizione, note]
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" - ");

        transactions.push(CanonicalTransaction {
            bank: Bank::RelaxBanking,
            transaction_date,
            value_date,
            // RelaxBanking has no type column
            type_raw: String::new(),
            description: if description.is_empty() {
                "N/A".to_string()
            } else {
                truncate_description(&description)
            },
            amount_in: if amount > 0.0 { amount.abs() } else { 0.0 },
            amount_out: if amount < 0.0 { amount.abs() } else { 0.0 },
            balance: None,
            source_file: None,
        });
    }
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Data contabile\tData valuta\tImporto\tDescrizione\tNote\n";

    #[test]
    fn test_parses_tab_separated_rows() {
        let text = format!(
            "{HEADER}15/01/2025\t16/01/2025\t-1.234,56\tPAGAMENTO POS\tCONAD VIA ROMA\n\
             17/01/2025\t17/01/2025\t2.000,00\tBONIFICO A VOSTRO FAVORE\tSTIPENDIO\n"
        );
        let txs = parse_text(&text).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].transaction_date, "2025-01-15");
        assert_eq!(txs[0].value_date, "2025-01-16");
        assert_eq!(txs[0].description, "PAGAMENTO POS - CONAD VIA ROMA");
        assert_eq!(txs[0].amount_out, 1234.56);
        assert_eq!(txs[1].amount_in, 2000.0);
        assert!(txs.iter().all(|t| (t.amount_in != 0.0) ^ (t.amount_out != 0.0)));
    }

    #[test]
    fn test_header_names_match_case_insensitively() {
        let text = "DATA CONTABILE\tDATA VALUTA\tIMPORTO\tDESCRIZIONE\tNOTE\n\
                    15/01/2025\t\t-10,00\tPOS\t\n";
        let txs = parse_text(text).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].value_date, "2025-01-15");
    }

    #[test]
    fn test_latin1_bytes_decode() {
        // "CAFFÈ" with È as the latin-1 byte 0xC8
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"15/01/2025\t\t-3,50\tCAFF\xc8 ROMA\t\n");
        let text = decode_latin1(&bytes);
        let txs = parse_text(&text).unwrap();
        assert_eq!(txs[0].description, "CAFFÈ ROMA");
    }

    #[test]
    fn test_description_truncated_to_exactly_490_chars() {
        let long = "X".repeat(600);
        let text = format!("{HEADER}15/01/2025\t\t-10,00\t{long}\t\n");
        let txs = parse_text(&text).unwrap();
        assert_eq!(txs[0].description.chars().count(), DESCRIPTION_MAX);
        assert!(txs[0].description.ends_with("..."));
    }

    #[test]
    fn test_description_at_cap_is_untouched() {
        let exact = "X".repeat(490);
        let text = format!("{HEADER}15/01/2025\t\t-10,00\t{exact}\t\n");
        let txs = parse_text(&text).unwrap();
        assert_eq!(txs[0].description, exact);
    }

    #[test]
    fn test_rows_without_date_or_amount_are_skipped() {
        let text = format!(
            "{HEADER}\t\t-10,00\tSENZA DATA\t\n\
             15/01/2025\t\t\tSENZA IMPORTO\t\n\
             15/01/2025\t\t0,00\tIMPORTO ZERO\t\n\
             16/01/2025\t\t-5,00\tVALIDA\t\n"
        );
        let txs = parse_text(&text).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].description, "VALIDA");
    }

    #[test]
    fn test_missing_columns_is_a_structural_error() {
        let err = parse_text("Colonna\tAltra\na\tb\n").unwrap_err();
        assert!(err.to_string().contains("required columns"));
    }

    #[test]
    fn test_note_only_description() {
        let text = format!("{HEADER}15/01/2025\t\t-10,00\t\tSOLO NOTE\n");
        let txs = parse_text(&text).unwrap();
        assert_eq!(txs[0].description, "SOLO NOTE");
    }
}
