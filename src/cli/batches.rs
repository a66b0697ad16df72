use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::money;
use crate::settings::get_data_dir;

pub fn list() -> Result<()> {
    let conn = get_connection(&get_data_dir().join("conto.db"))?;
    let mut stmt = conn.prepare(
        "SELECT b.id, b.bank, b.filename, b.records_total, b.records_imported, b.records_duplicates, \
                b.status, coalesce(sum(t.amount_in), 0), coalesce(sum(t.amount_out), 0) \
         FROM import_batches b LEFT JOIN transactions t ON t.import_batch_id = b.id \
         GROUP BY b.id ORDER BY b.id DESC",
    )?;
    let rows: Vec<(i64, String, String, i64, Option<i64>, Option<i64>, String, f64, f64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Bank", "File", "Total", "Imported", "Duplicates", "Status", "In", "Out",
    ]);
    for (id, bank, filename, total, imported, duplicates, status, sum_in, sum_out) in rows {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(bank),
            Cell::new(filename),
            Cell::new(total),
            Cell::new(imported.map(|v| v.to_string()).unwrap_or_default()),
            Cell::new(duplicates.map(|v| v.to_string()).unwrap_or_default()),
            Cell::new(status),
            Cell::new(money(sum_in)),
            Cell::new(money(sum_out)),
        ]);
    }
    println!("Import batches\n{table}");
    Ok(())
}
