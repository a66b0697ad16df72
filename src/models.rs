use crate::error::{ContoError, Result};

/// Institution a statement file originates from. Set once by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Widiba,
    RelaxBanking,
    TradeRepublic,
}

impl Bank {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Widiba => "widiba",
            Self::RelaxBanking => "relaxbanking",
            Self::TradeRepublic => "traderepublic",
        }
    }

    #[allow(dead_code)]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Widiba => "Widiba",
            Self::RelaxBanking => "RelaxBanking",
            Self::TradeRepublic => "Trade Republic",
        }
    }

    pub fn from_key(key: &str) -> Result<Self> {
        match key.to_lowercase().as_str() {
            "widiba" => Ok(Self::Widiba),
            "relaxbanking" => Ok(Self::RelaxBanking),
            "traderepublic" => Ok(Self::TradeRepublic),
            other => Err(ContoError::UnknownBank(other.to_string())),
        }
    }
}

/// Common shape every statement parser converges to, before classification.
#[derive(Debug, Clone)]
pub struct CanonicalTransaction {
    pub bank: Bank,
    /// ISO date (YYYY-MM-DD) the transaction was posted.
    pub transaction_date: String,
    /// ISO settlement date; equals `transaction_date` when the source has none.
    pub value_date: String,
    /// Institution-specific type label ("Bonifico", a CAUSALE code, ...).
    pub type_raw: String,
    pub description: String,
    pub amount_in: f64,
    pub amount_out: f64,
    /// Running balance as stated by the source; reference only.
    pub balance: Option<f64>,
    pub source_file: Option<String>,
}

impl CanonicalTransaction {
    /// The single non-zero amount of the in/out pair.
    pub fn resolved_amount(&self) -> f64 {
        if self.amount_in != 0.0 {
            self.amount_in
        } else {
            self.amount_out
        }
    }
}

/// Which tier produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Rule,
    Ai,
    Manual,
    Fallback,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Ai => "ai",
            Self::Manual => "manual",
            Self::Fallback => "fallback",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "rule" => Self::Rule,
            "ai" => Self::Ai,
            "manual" => Self::Manual,
            _ => Self::Fallback,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub type_: String,
    pub category: String,
    pub merchant: Option<String>,
    pub confidence: f64,
    pub source: ClassificationSource,
}

impl Classification {
    /// Conservative result used when no tier could classify a transaction.
    pub fn fallback() -> Self {
        Self {
            type_: "other".to_string(),
            category: "uncategorized".to_string(),
            merchant: None,
            confidence: 0.0,
            source: ClassificationSource::Fallback,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedTransaction {
    pub tx: CanonicalTransaction,
    pub classification: Classification,
    pub cache_hit: bool,
}

#[derive(Debug, Clone)]
pub struct CheckedTransaction {
    pub tx: ClassifiedTransaction,
    pub hash: String,
    pub is_duplicate: bool,
    pub existing_id: Option<i64>,
}

/// One entry of the learned classification cache, keyed by normalized
/// description. Written through on first AI classification or manual
/// correction, touched on every later hit.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub type_: String,
    pub category: String,
    pub merchant: Option<String>,
    pub confidence: f64,
    pub source: ClassificationSource,
    pub hit_count: i64,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i64,
    pub pattern: String,
    pub match_type: String,
    pub type_: String,
    pub category: String,
    pub priority: i64,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub id: i64,
    pub bank: String,
    pub filename: String,
    pub records_total: i64,
    pub records_imported: Option<i64>,
    pub records_duplicates: Option<i64>,
    pub status: String,
    pub completed_at: Option<String>,
}
