use comfy_table::{Cell, Table};

use crate::classifier::load_rules;
use crate::db::get_connection;
use crate::error::{ContoError, Result};
use crate::settings::get_data_dir;

pub fn add(pattern: &str, type_: &str, category: &str, match_type: &str, priority: i64) -> Result<()> {
    if !matches!(match_type, "contains" | "startswith" | "regex") {
        return Err(ContoError::Other(format!(
            "invalid match type {match_type:?} (expected contains, startswith or regex)"
        )));
    }
    let conn = get_connection(&get_data_dir().join("conto.db"))?;
    conn.execute(
        "INSERT INTO classification_rules (pattern, match_type, type, category, priority) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![pattern, match_type, type_, category, priority],
    )?;
    println!("Added rule: '{pattern}' \u{2192} {type_}/{category}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("conto.db"))?;
    let rules = load_rules(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Match", "Type", "Category", "Priority"]);
    for rule in rules {
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(rule.pattern),
            Cell::new(rule.match_type),
            Cell::new(rule.type_),
            Cell::new(rule.category),
            Cell::new(rule.priority),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}
