//! Duplicate detection and import batch accounting.
//!
//! Each transaction gets a content hash over its defining fields; a
//! pre-check against persisted hashes flags duplicates, and the UNIQUE
//! constraint on the hash column catches the race between the pre-check and
//! the insert when overlapping files are imported concurrently.

use colored::Colorize;
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{Bank, CanonicalTransaction, CheckedTransaction, ClassifiedTransaction};

/// Deterministic fingerprint over (bank, transaction_date, resolved amount,
/// description). Identical source rows always hash identically, across
/// repeated uploads of overlapping date ranges.
pub fn transaction_hash(tx: &CanonicalTransaction) -> String {
    let input = format!(
        "{}|{}|{}|{}",
        tx.bank.key(),
        tx.transaction_date,
        tx.resolved_amount(),
        tx.description
    )
    .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Annotate each transaction with its hash and whether that hash is already
/// persisted. Nothing is mutated or dropped here.
pub fn check_duplicates(
    conn: &Connection,
    transactions: Vec<ClassifiedTransaction>,
) -> Result<Vec<CheckedTransaction>> {
    transactions
        .into_iter()
        .map(|tx| {
            let hash = transaction_hash(&tx.tx);
            let existing_id: Option<i64> = conn
                .query_row("SELECT id FROM transactions WHERE hash = ?1", [&hash], |r| r.get(0))
                .optional()?;
            Ok(CheckedTransaction {
                tx,
                hash,
                is_duplicate: existing_id.is_some(),
                existing_id,
            })
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SaveResult {
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
}

/// Insert the batch record before any transaction insert, so every persisted
/// row references a valid batch id.
pub fn create_import_batch(conn: &Connection, bank: Bank, filename: &str, total: usize) -> Result<i64> {
    conn.execute(
        "INSERT INTO import_batches (bank, filename, records_total, status) VALUES (?1, ?2, ?3, 'pending')",
        rusqlite::params![bank.key(), filename, total as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Persist non-duplicate rows. Partial success is the expected outcome: a
/// uniqueness violation counts as a duplicate, any other insert failure is
/// counted and the row dropped.
pub fn save_transactions(
    conn: &Connection,
    transactions: &[CheckedTransaction],
    batch_id: i64,
) -> SaveResult {
    let mut result = SaveResult::default();

    for checked in transactions {
        if checked.is_duplicate {
            result.duplicates += 1;
            continue;
        }
        let tx = &checked.tx.tx;
        let cls = &checked.tx.classification;
        let insert = conn.execute(
            "INSERT INTO transactions \
             (bank, source_file, import_batch_id, transaction_date, value_date, type, category, \
              description, merchant, amount_in, amount_out, balance, status, hash) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 'active', ?13)",
            rusqlite::params![
                tx.bank.key(),
                tx.source_file,
                batch_id,
                tx.transaction_date,
                tx.value_date,
                cls.type_,
                cls.category,
                tx.description,
                cls.merchant,
                tx.amount_in,
                tx.amount_out,
                tx.balance,
                checked.hash,
            ],
        );
        match insert {
            Ok(_) => result.imported += 1,
            Err(e) if is_unique_violation(&e) => result.duplicates += 1,
            Err(e) => {
                eprintln!("{} failed to save transaction: {e}", "warning:".yellow());
                result.errors += 1;
            }
        }
    }
    result
}

/// Terminal batch update. A batch left in 'pending' afterwards means the
/// import crashed midway; it is a diagnostic signal, not auto-recovered.
pub fn update_import_batch(conn: &Connection, batch_id: i64, results: &SaveResult) -> Result<()> {
    conn.execute(
        "UPDATE import_batches SET records_imported = ?1, records_duplicates = ?2, \
         status = 'completed', completed_at = datetime('now') WHERE id = ?3",
        rusqlite::params![results.imported as i64, results.duplicates as i64, batch_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::Classification;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn canonical(bank: Bank, date: &str, amount_out: f64, description: &str) -> CanonicalTransaction {
        CanonicalTransaction {
            bank,
            transaction_date: date.to_string(),
            value_date: date.to_string(),
            type_raw: String::new(),
            description: description.to_string(),
            amount_in: 0.0,
            amount_out,
            balance: None,
            source_file: Some("test.xlsx".to_string()),
        }
    }

    fn classified(tx: CanonicalTransaction) -> ClassifiedTransaction {
        ClassifiedTransaction {
            tx,
            classification: Classification::fallback(),
            cache_hit: false,
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = canonical(Bank::Widiba, "2025-01-15", 42.5, "CONAD VIA ROMA");
        let b = canonical(Bank::Widiba, "2025-01-15", 42.5, "CONAD VIA ROMA");
        assert_eq!(transaction_hash(&a), transaction_hash(&b));
    }

    #[test]
    fn test_hash_differs_on_any_field() {
        let base = canonical(Bank::Widiba, "2025-01-15", 42.5, "CONAD VIA ROMA");
        let other_bank = canonical(Bank::RelaxBanking, "2025-01-15", 42.5, "CONAD VIA ROMA");
        let other_date = canonical(Bank::Widiba, "2025-01-16", 42.5, "CONAD VIA ROMA");
        let other_amount = canonical(Bank::Widiba, "2025-01-15", 42.51, "CONAD VIA ROMA");
        let other_desc = canonical(Bank::Widiba, "2025-01-15", 42.5, "CONAD VIA MILANO");
        let h = transaction_hash(&base);
        assert_ne!(h, transaction_hash(&other_bank));
        assert_ne!(h, transaction_hash(&other_date));
        assert_ne!(h, transaction_hash(&other_amount));
        assert_ne!(h, transaction_hash(&other_desc));
    }

    #[test]
    fn test_hash_uses_resolved_amount() {
        let mut inbound = canonical(Bank::Widiba, "2025-01-15", 0.0, "BONIFICO");
        inbound.amount_in = 100.0;
        let mut outbound = canonical(Bank::Widiba, "2025-01-15", 100.0, "BONIFICO");
        outbound.amount_out = 100.0;
        // same resolved amount, same hash: the side is not part of the input
        assert_eq!(transaction_hash(&inbound), transaction_hash(&outbound));
    }

    #[test]
    fn test_check_duplicates_annotates_without_dropping() {
        let (_dir, conn) = test_db();
        let txs = vec![
            classified(canonical(Bank::Widiba, "2025-01-15", 10.0, "A")),
            classified(canonical(Bank::Widiba, "2025-01-16", 20.0, "B")),
        ];
        let checked = check_duplicates(&conn, txs).unwrap();
        assert_eq!(checked.len(), 2);
        assert!(checked.iter().all(|c| !c.is_duplicate && c.existing_id.is_none()));

        let batch_id = create_import_batch(&conn, Bank::Widiba, "f.xlsx", 2).unwrap();
        save_transactions(&conn, &checked, batch_id);

        let again = check_duplicates(
            &conn,
            vec![classified(canonical(Bank::Widiba, "2025-01-15", 10.0, "A"))],
        )
        .unwrap();
        assert!(again[0].is_duplicate);
        assert!(again[0].existing_id.is_some());
    }

    #[test]
    fn test_save_skips_flagged_duplicates() {
        let (_dir, conn) = test_db();
        let batch_id = create_import_batch(&conn, Bank::Widiba, "f.xlsx", 2).unwrap();
        let mut checked =
            check_duplicates(&conn, vec![classified(canonical(Bank::Widiba, "2025-01-15", 10.0, "A"))])
                .unwrap();
        checked[0].is_duplicate = true;
        let result = save_transactions(&conn, &checked, batch_id);
        assert_eq!(result.imported, 0);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.errors, 0);
    }

    #[test]
    fn test_unique_violation_counts_as_duplicate_not_error() {
        let (_dir, conn) = test_db();
        let batch_id = create_import_batch(&conn, Bank::Widiba, "f.xlsx", 2).unwrap();
        // same row checked twice before either insert: the second insert
        // trips the constraint, the safety net reclassifies it
        let checked = check_duplicates(
            &conn,
            vec![
                classified(canonical(Bank::Widiba, "2025-01-15", 10.0, "A")),
                classified(canonical(Bank::Widiba, "2025-01-15", 10.0, "A")),
            ],
        )
        .unwrap();
        let result = save_transactions(&conn, &checked, batch_id);
        assert_eq!(result.imported, 1);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.errors, 0);
    }

    #[test]
    fn test_batch_lifecycle() {
        let (_dir, conn) = test_db();
        let batch_id = create_import_batch(&conn, Bank::TradeRepublic, "estratto.pdf", 5).unwrap();

        let (status, total): (String, i64) = conn
            .query_row(
                "SELECT status, records_total FROM import_batches WHERE id = ?1",
                [batch_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "pending");
        assert_eq!(total, 5);

        let result = SaveResult { imported: 3, duplicates: 2, errors: 0 };
        update_import_batch(&conn, batch_id, &result).unwrap();

        let (status, imported, duplicates, completed_at): (String, i64, i64, Option<String>) = conn
            .query_row(
                "SELECT status, records_imported, records_duplicates, completed_at \
                 FROM import_batches WHERE id = ?1",
                [batch_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(status, "completed");
        assert_eq!(imported, 3);
        assert_eq!(duplicates, 2);
        assert!(completed_at.is_some());
    }

    #[test]
    fn test_saved_row_carries_classification_and_batch() {
        let (_dir, conn) = test_db();
        let batch_id = create_import_batch(&conn, Bank::Widiba, "f.xlsx", 1).unwrap();
        let mut classified_tx = classified(canonical(Bank::Widiba, "2025-01-15", 10.0, "CONAD"));
        classified_tx.classification = Classification {
            type_: "card".to_string(),
            category: "groceries".to_string(),
            merchant: Some("Conad".to_string()),
            confidence: 0.9,
            source: crate::models::ClassificationSource::Ai,
        };
        let checked = check_duplicates(&conn, vec![classified_tx]).unwrap();
        save_transactions(&conn, &checked, batch_id);

        let (category, merchant, status, got_batch): (String, Option<String>, String, i64) = conn
            .query_row(
                "SELECT category, merchant, status, import_batch_id FROM transactions LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(category, "groceries");
        assert_eq!(merchant.as_deref(), Some("Conad"));
        assert_eq!(status, "active");
        assert_eq!(got_batch, batch_id);
    }
}
