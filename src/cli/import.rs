use std::path::PathBuf;

use colored::Colorize;

use crate::classifier::{load_rules, ClassificationEngine, Classifier, SqliteCache};
use crate::db::get_connection;
use crate::error::Result;
use crate::importer::{import_files, FileOutcome};
use crate::models::Bank;
use crate::settings::{get_data_dir, load_settings};

pub fn run(files: &[String], bank: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&get_data_dir().join("conto.db"))?;
    let bank_override = bank.map(Bank::from_key).transpose()?;

    let rules = load_rules(&conn)?;
    let cache = SqliteCache::new(&conn);

    #[cfg(feature = "ai")]
    let ai_client = if settings.ai_enabled {
        let client = crate::anthropic::ClaudeClassifier::from_env(&settings.model)?;
        if client.is_none() {
            eprintln!(
                "{} AI classification is enabled but ANTHROPIC_API_KEY is not set; cache misses will be uncategorized",
                "warning:".yellow()
            );
        }
        client
    } else {
        None
    };
    #[cfg(feature = "ai")]
    let ai: Option<&dyn Classifier> = ai_client.as_ref().map(|c| c as &dyn Classifier);
    #[cfg(not(feature = "ai"))]
    let ai: Option<&dyn Classifier> = {
        let _ = &settings;
        None
    };

    let engine = ClassificationEngine::new(rules, &cache, ai);
    let paths: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
    let reports = import_files(&conn, &engine, &paths, bank_override);

    for report in &reports {
        match &report.outcome {
            FileOutcome::Success { bank, total, imported, duplicates, errors, .. } => {
                println!(
                    "{} {} [{}]: {} parsed, {} imported, {} duplicates, {} errors",
                    "ok".green(),
                    report.name,
                    bank.key(),
                    total,
                    imported,
                    duplicates,
                    errors
                );
            }
            FileOutcome::Warning { bank, message } => {
                println!("{} {} [{}]: {message}", "warning".yellow(), report.name, bank.key());
            }
            FileOutcome::Error { message } => {
                println!("{} {}: {message}", "error".red(), report.name);
            }
        }
    }
    Ok(())
}
