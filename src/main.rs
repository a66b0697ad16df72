#[cfg(feature = "ai")]
mod anthropic;
mod classifier;
mod cli;
mod db;
mod dedup;
mod error;
mod fmt;
mod importer;
mod locale;
mod models;
mod normalizer;
mod parsers;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, RulesCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Import { files, bank } => cli::import::run(&files, bank.as_deref()),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                type_,
                category,
                match_type,
                priority,
            } => cli::rules::add(&pattern, &type_, &category, &match_type, priority),
            RulesCommands::List => cli::rules::list(),
        },
        Commands::Correct {
            description,
            type_,
            category,
            merchant,
        } => cli::correct::run(&description, &type_, &category, merchant.as_deref()),
        Commands::Cache => cli::cache::stats(),
        Commands::Batches => cli::batches::list(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
