//! Three-tier transaction classification: static rules, learned cache,
//! AI batch classifier, with a conservative fallback.
//!
//! The cache is the mechanism that bounds AI cost over time: every AI result
//! is written through under the normalized description, so the next import
//! of the same merchant resolves at tier 2. Batches run sequentially so a
//! later batch observes cache entries written by an earlier one.

use colored::Colorize;
use regex::RegexBuilder;
use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{
    CacheEntry, CanonicalTransaction, Classification, ClassificationSource, ClassifiedTransaction,
    Rule,
};
use crate::normalizer::normalize_description;

/// Max transactions per external classification call.
pub const BATCH_SIZE: usize = 30;

/// One transaction's worth of context handed to the external classifier.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub bank: String,
    pub type_raw: String,
    pub description: String,
}

/// What the external classifier returns per transaction.
#[derive(Debug, Clone)]
pub struct AiClassification {
    pub type_: String,
    pub category: String,
    pub merchant: Option<String>,
    pub confidence: f64,
}

/// External classification capability. Implementations must fail loudly: a
/// response that cannot be parsed into one classification per request is an
/// `Err`, never a partial array.
pub trait Classifier {
    fn classify(&self, batch: &[ClassificationRequest]) -> Result<Vec<AiClassification>>;
}

/// Classification cache access: read-check on lookup, write-through after AI
/// classification, read-modify-write for hit telemetry.
pub trait CacheStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn upsert(&self, key: &str, entry: &CacheEntry) -> Result<()>;
    fn touch(&self, key: &str) -> Result<()>;
}

pub struct SqliteCache<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCache<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CacheStore for SqliteCache<'_> {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT type, category, merchant, confidence, source, hit_count \
                 FROM classification_cache WHERE description_normalized = ?1",
                [key],
                |row| {
                    Ok(CacheEntry {
                        type_: row.get(0)?,
                        category: row.get(1)?,
                        merchant: row.get(2)?,
                        confidence: row.get(3)?,
                        source: ClassificationSource::from_str(&row.get::<_, String>(4)?),
                        hit_count: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn upsert(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO classification_cache \
             (description_normalized, type, category, merchant, confidence, source) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(description_normalized) DO UPDATE SET \
             type = excluded.type, category = excluded.category, merchant = excluded.merchant, \
             confidence = excluded.confidence, source = excluded.source, \
             last_used_at = datetime('now')",
            rusqlite::params![
                key,
                entry.type_,
                entry.category,
                entry.merchant,
                entry.confidence,
                entry.source.as_str(),
            ],
        )?;
        Ok(())
    }

    fn touch(&self, key: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE classification_cache SET hit_count = hit_count + 1, \
             last_used_at = datetime('now') WHERE description_normalized = ?1",
            [key],
        )?;
        Ok(())
    }
}

/// Active rules, highest priority first, insertion order as tiebreaker.
pub fn load_rules(conn: &Connection) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, match_type, type, category, priority FROM classification_rules \
         WHERE is_active = 1 ORDER BY priority DESC, id ASC",
    )?;
    let rules = stmt
        .query_map([], |row| {
            Ok(Rule {
                id: row.get(0)?,
                pattern: row.get(1)?,
                match_type: row.get(2)?,
                type_: row.get(3)?,
                category: row.get(4)?,
                priority: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rules)
}

fn rule_matches(normalized: &str, rule: &Rule) -> bool {
    match rule.match_type.as_str() {
        "contains" => normalized.contains(&rule.pattern.to_uppercase()),
        "startswith" => normalized.starts_with(&rule.pattern.to_uppercase()),
        "regex" => match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
            Ok(re) => re.is_match(normalized),
            Err(_) => {
                eprintln!("{} invalid regex pattern in rule {}: {:?}", "warning:".yellow(), rule.id, rule.pattern);
                false
            }
        },
        _ => false,
    }
}

pub struct ClassificationEngine<'a> {
    rules: Vec<Rule>,
    cache: &'a dyn CacheStore,
    /// None disables the AI tier: cache misses fall through to the fallback.
    ai: Option<&'a dyn Classifier>,
}

impl<'a> ClassificationEngine<'a> {
    pub fn new(rules: Vec<Rule>, cache: &'a dyn CacheStore, ai: Option<&'a dyn Classifier>) -> Self {
        Self { rules, cache, ai }
    }

    /// Classify a file's worth of transactions, one result per input, order
    /// preserved.
    pub fn classify(
        &self,
        transactions: Vec<CanonicalTransaction>,
    ) -> Result<Vec<ClassifiedTransaction>> {
        let mut slots: Vec<Option<ClassifiedTransaction>> =
            transactions.iter().map(|_| None).collect();
        let mut pending: Vec<(usize, String, CanonicalTransaction)> = Vec::new();

        for (i, tx) in transactions.into_iter().enumerate() {
            let normalized = normalize_description(&tx.description);

            if let Some(classification) = self.match_rules(&normalized) {
                slots[i] = Some(ClassifiedTransaction {
                    tx,
                    classification,
                    cache_hit: false,
                });
                continue;
            }

            if let Some(entry) = self.cache.get(&normalized)? {
                self.cache.touch(&normalized)?;
                slots[i] = Some(ClassifiedTransaction {
                    tx,
                    classification: entry_to_classification(&entry),
                    cache_hit: true,
                });
                continue;
            }

            pending.push((i, normalized, tx));
        }

        for chunk in pending.chunks(BATCH_SIZE) {
            self.classify_batch(chunk, &mut slots)?;
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn match_rules(&self, normalized: &str) -> Option<Classification> {
        self.rules
            .iter()
            .find(|rule| rule_matches(normalized, rule))
            .map(|rule| Classification {
                type_: rule.type_.clone(),
                category: rule.category.clone(),
                merchant: None,
                confidence: 1.0,
                source: ClassificationSource::Rule,
            })
    }

    fn classify_batch(
        &self,
        chunk: &[(usize, String, CanonicalTransaction)],
        slots: &mut [Option<ClassifiedTransaction>],
    ) -> Result<()> {
        // An earlier batch may already have cached some of these keys.
        let mut misses: Vec<&(usize, String, CanonicalTransaction)> = Vec::new();
        for item in chunk {
            let (i, normalized, tx) = item;
            if let Some(entry) = self.cache.get(normalized)? {
                self.cache.touch(normalized)?;
                slots[*i] = Some(ClassifiedTransaction {
                    tx: tx.clone(),
                    classification: entry_to_classification(&entry),
                    cache_hit: true,
                });
            } else {
                misses.push(item);
            }
        }
        if misses.is_empty() {
            return Ok(());
        }

        let Some(ai) = self.ai else {
            for (i, _, tx) in misses {
                slots[*i] = Some(fallback_result(tx.clone()));
            }
            return Ok(());
        };

        let requests: Vec<ClassificationRequest> = misses
            .iter()
            .map(|(_, _, tx)| ClassificationRequest {
                bank: tx.bank.key().to_string(),
                type_raw: tx.type_raw.clone(),
                description: tx.description.clone(),
            })
            .collect();

        let classifications = match ai.classify(&requests) {
            Ok(c) if c.len() == misses.len() => c,
            Ok(c) => {
                // Misaligned positional assignment would attach results to
                // the wrong transactions; fail the whole batch instead.
                eprintln!(
                    "{} classification count mismatch: got {}, expected {}; falling back for this batch",
                    "warning:".yellow(),
                    c.len(),
                    misses.len()
                );
                for (i, _, tx) in misses {
                    slots[*i] = Some(fallback_result(tx.clone()));
                }
                return Ok(());
            }
            Err(e) => {
                eprintln!("{} batch classification failed: {e}", "warning:".yellow());
                for (i, _, tx) in misses {
                    slots[*i] = Some(fallback_result(tx.clone()));
                }
                return Ok(());
            }
        };

        for ((i, normalized, tx), cls) in misses.into_iter().zip(classifications) {
            self.cache.upsert(
                normalized,
                &CacheEntry {
                    type_: cls.type_.clone(),
                    category: cls.category.clone(),
                    merchant: cls.merchant.clone(),
                    confidence: cls.confidence,
                    source: ClassificationSource::Ai,
                    hit_count: 0,
                },
            )?;
            slots[*i] = Some(ClassifiedTransaction {
                tx: tx.clone(),
                classification: Classification {
                    type_: cls.type_,
                    category: cls.category,
                    merchant: cls.merchant,
                    confidence: cls.confidence,
                    source: ClassificationSource::Ai,
                },
                cache_hit: false,
            });
        }
        Ok(())
    }
}

fn entry_to_classification(entry: &CacheEntry) -> Classification {
    Classification {
        type_: entry.type_.clone(),
        category: entry.category.clone(),
        merchant: entry.merchant.clone(),
        confidence: entry.confidence,
        source: entry.source,
    }
}

fn fallback_result(tx: CanonicalTransaction) -> ClassifiedTransaction {
    ClassifiedTransaction {
        tx,
        classification: Classification::fallback(),
        cache_hit: false,
    }
}

/// Operator correction: write an authoritative entry straight into the
/// cache. Future imports of the same normalized description resolve to it
/// at tier 2; only a static rule can still outrank it.
pub fn override_classification(
    cache: &dyn CacheStore,
    description: &str,
    type_: &str,
    category: &str,
    merchant: Option<&str>,
) -> Result<String> {
    let normalized = normalize_description(description);
    cache.upsert(
        &normalized,
        &CacheEntry {
            type_: type_.to_string(),
            category: category.to_string(),
            merchant: merchant.map(|m| m.to_string()),
            confidence: 1.0,
            source: ClassificationSource::Manual,
            hit_count: 0,
        },
    )?;
    Ok(normalized)
}
