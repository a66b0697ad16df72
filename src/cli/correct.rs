use crate::classifier::{override_classification, SqliteCache};
use crate::db::get_connection;
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn run(description: &str, type_: &str, category: &str, merchant: Option<&str>) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("conto.db"))?;
    let cache = SqliteCache::new(&conn);
    let normalized = override_classification(&cache, description, type_, category, merchant)?;
    println!("Saved correction for '{normalized}' \u{2192} {type_}/{category}");
    println!("Future imports matching this description will use it (static rules still take precedence).");
    Ok(())
}
