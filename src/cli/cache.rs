use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn stats() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("conto.db"))?;

    let (entries, hits): (i64, i64) = conn.query_row(
        "SELECT count(*), coalesce(sum(hit_count), 0) FROM classification_cache",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    println!("Cache entries: {entries}, total hits: {hits}");

    let mut stmt = conn.prepare(
        "SELECT source, count(*) FROM classification_cache GROUP BY source ORDER BY count(*) DESC",
    )?;
    let by_source: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for (source, count) in &by_source {
        println!("  {source}: {count}");
    }

    let mut stmt = conn.prepare(
        "SELECT description_normalized, type, category, merchant, hit_count, last_used_at \
         FROM classification_cache ORDER BY hit_count DESC, last_used_at DESC LIMIT 10",
    )?;
    let top: Vec<(String, String, String, Option<String>, i64, Option<String>)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["Description", "Type", "Category", "Merchant", "Hits", "Last used"]);
    for (desc, type_, category, merchant, hit_count, last_used) in top {
        table.add_row(vec![
            Cell::new(desc),
            Cell::new(type_),
            Cell::new(category),
            Cell::new(merchant.unwrap_or_default()),
            Cell::new(hit_count),
            Cell::new(last_used.unwrap_or_default()),
        ]);
    }
    println!("Most used entries\n{table}");
    Ok(())
}
