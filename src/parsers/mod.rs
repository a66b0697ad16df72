//! Statement parsers, one per institution, all converging on
//! `Vec<CanonicalTransaction>`. Which parser handles a file is decided here
//! from the filename (institution name substring, then extension fallback).

pub mod relaxbanking;
pub mod traderepublic;
#[cfg(feature = "xlsx")]
pub mod widiba;

use std::path::Path;

use crate::error::Result;
use crate::models::{Bank, CanonicalTransaction};

/// Detect the institution from the filename. Substring match first, file
/// extension as a fallback.
pub fn detect_bank(filename: &str) -> Option<Bank> {
    let lower = filename.to_lowercase();
    if lower.contains("widiba") {
        return Some(Bank::Widiba);
    }
    if lower.contains("relax") {
        return Some(Bank::RelaxBanking);
    }
    if lower.contains("trade") || lower.contains("republic") {
        return Some(Bank::TradeRepublic);
    }
    match Path::new(&lower).extension().and_then(|e| e.to_str()) {
        Some("pdf") => Some(Bank::TradeRepublic),
        Some("xlsx") => Some(Bank::Widiba),
        // RelaxBanking exports are TSV mislabeled as .xls
        Some("xls") => Some(Bank::RelaxBanking),
        _ => None,
    }
}

/// Parse one statement file with the institution's parser.
pub fn parse_statement(bank: Bank, path: &Path) -> Result<Vec<CanonicalTransaction>> {
    match bank {
        Bank::Widiba => {
            #[cfg(feature = "xlsx")]
            {
                widiba::parse(path)
            }
            #[cfg(not(feature = "xlsx"))]
            {
                Err(crate::error::ContoError::Parse("built without xlsx support".to_string()))
            }
        }
        Bank::RelaxBanking => relaxbanking::parse(path),
        Bank::TradeRepublic => {
            #[cfg(feature = "pdf")]
            {
                traderepublic::parse(path)
            }
            #[cfg(not(feature = "pdf"))]
            {
                Err(crate::error::ContoError::Parse("built without pdf support".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_bank_by_name() {
        assert_eq!(detect_bank("widiba_gennaio.xlsx"), Some(Bank::Widiba));
        assert_eq!(detect_bank("Estratto_RELAX_2024.xls"), Some(Bank::RelaxBanking));
        assert_eq!(detect_bank("TradeRepublic-statement.pdf"), Some(Bank::TradeRepublic));
    }

    #[test]
    fn test_detect_bank_by_extension() {
        assert_eq!(detect_bank("gennaio.xlsx"), Some(Bank::Widiba));
        assert_eq!(detect_bank("movimenti.xls"), Some(Bank::RelaxBanking));
        assert_eq!(detect_bank("estratto.pdf"), Some(Bank::TradeRepublic));
        assert_eq!(detect_bank("statement.csv"), None);
    }
}
