use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS import_batches (
    id INTEGER PRIMARY KEY,
    bank TEXT NOT NULL,
    filename TEXT NOT NULL,
    records_total INTEGER NOT NULL,
    records_imported INTEGER,
    records_duplicates INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT DEFAULT (datetime('now')),
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    bank TEXT NOT NULL,
    source_file TEXT,
    import_batch_id INTEGER NOT NULL,
    transaction_date TEXT NOT NULL,
    value_date TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'other',
    category TEXT NOT NULL DEFAULT 'uncategorized',
    description TEXT NOT NULL,
    merchant TEXT,
    amount_in REAL NOT NULL DEFAULT 0,
    amount_out REAL NOT NULL DEFAULT 0,
    balance REAL,
    status TEXT NOT NULL DEFAULT 'active',
    hash TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_batch_id) REFERENCES import_batches(id)
);

CREATE TABLE IF NOT EXISTS classification_cache (
    id INTEGER PRIMARY KEY,
    description_normalized TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL,
    category TEXT NOT NULL,
    merchant TEXT,
    confidence REAL NOT NULL DEFAULT 0,
    source TEXT NOT NULL DEFAULT 'ai',
    hit_count INTEGER NOT NULL DEFAULT 0,
    last_used_at TEXT DEFAULT (datetime('now')),
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS classification_rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    match_type TEXT NOT NULL DEFAULT 'contains',
    type TEXT NOT NULL,
    category TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);
";

// (pattern, match_type, type, category, priority)
// Patterns match against the normalized (uppercased, punctuation-stripped)
// description, so they carry no dots or accents.
const DEFAULT_RULES: &[(&str, &str, &str, &str, i64)] = &[
    ("PAGAMENTO DEGLI INTERESSI", "contains", "income", "interest", 80),
    ("INTEREST PAYMENT", "contains", "income", "interest", 80),
    ("CEDOLA", "contains", "income", "interest", 75),
    ("CASH DIVIDEND", "contains", "income", "dividend", 75),
    ("REDDITI", "contains", "income", "dividend", 75),
    ("STAMP DUTY", "contains", "tax", "taxes", 70),
    ("IMPOSTA DI BOLLO", "contains", "tax", "taxes", 70),
    ("UTILIZZO CARTA DI CREDITO", "contains", "card", "credit card", 65),
    ("PRELIEVO", "contains", "atm", "atm", 60),
    ("COMMISSIONI", "contains", "fee", "fees", 55),
    ("CANONE", "contains", "fee", "fees", 50),
    ("BONIFICO", "contains", "transfer", "transfers", 40),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM classification_rules", [], |row| row.get(0))?;
    if count == 0 {
        for rule in DEFAULT_RULES {
            conn.execute(
                "INSERT INTO classification_rules (pattern, match_type, type, category, priority) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![rule.0, rule.1, rule.2, rule.3, rule.4],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["transactions", "import_batches", "classification_cache", "classification_rules"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM classification_rules", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, DEFAULT_RULES.len() as i64);
    }

    #[test]
    fn test_transaction_hash_is_unique() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO import_batches (bank, filename, records_total) VALUES ('widiba', 'f.xlsx', 1)",
            [],
        )
        .unwrap();
        let insert = "INSERT INTO transactions (bank, import_batch_id, transaction_date, value_date, description, amount_out, hash) \
                      VALUES ('widiba', 1, '2025-01-15', '2025-01-15', 'CONAD', 42.0, 'samehash')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }

    #[test]
    fn test_seed_rules_are_priority_ordered() {
        let (_dir, conn) = test_db();
        let top: String = conn
            .query_row(
                "SELECT pattern FROM classification_rules ORDER BY priority DESC, id ASC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(top, "PAGAMENTO DEGLI INTERESSI");
    }
}
