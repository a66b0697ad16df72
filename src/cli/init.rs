use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    std::fs::create_dir_all(&settings.data_dir)?;
    save_settings(&settings)?;

    let conn = get_connection(&PathBuf::from(&settings.data_dir).join("conto.db"))?;
    init_db(&conn)?;

    println!("Initialized conto database in {}", settings.data_dir);
    if !settings.ai_enabled {
        println!("AI classification is disabled; enable it in settings.json and set ANTHROPIC_API_KEY.");
    }
    Ok(())
}
