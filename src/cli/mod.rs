pub mod batches;
pub mod cache;
pub mod correct;
pub mod import;
pub mod init;
pub mod rules;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "conto", about = "Bank statement import and classification for Italian accounts.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up conto: choose a data directory and initialize the database.
    Init {
        /// Path for conto data (default: ~/Documents/conto)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Import statement files (Widiba XLSX, RelaxBanking TSV, Trade Republic PDF).
    Import {
        /// Statement files to import
        #[arg(required = true)]
        files: Vec<String>,
        /// Force a bank (widiba, relaxbanking, traderepublic) instead of
        /// detecting it from the filename
        #[arg(long)]
        bank: Option<String>,
    },
    /// Manage classification rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Correct the classification for a description (manual cache override).
    Correct {
        /// Transaction description to correct
        description: String,
        /// Transaction type (expense, income, card, ...)
        #[arg(long = "type")]
        type_: String,
        /// Category (groceries, transfers, ...)
        #[arg(long)]
        category: String,
        /// Merchant name, if identifiable
        #[arg(long)]
        merchant: Option<String>,
    },
    /// Show classification cache statistics.
    Cache,
    /// List import batches.
    Batches,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a new rule.
    Add {
        /// Pattern matched against the normalized description
        pattern: String,
        /// Transaction type the rule assigns
        #[arg(long = "type")]
        type_: String,
        /// Category the rule assigns
        #[arg(long)]
        category: String,
        /// contains, startswith or regex
        #[arg(long, default_value = "contains")]
        match_type: String,
        /// Higher priority rules are checked first
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },
    /// List active rules.
    List,
}
