//! Trade Republic statement parser.
//!
//! Works on the plain text extracted from the PDF. The transaction table
//! sits between two section markers; each entry starts with a day + Italian
//! month abbreviation, carries the year on the next token or line, and may
//! wrap its description over any number of lines before the line holding the
//! euro amounts. An explicit state machine over the line stream keeps the
//! two physical layouts (single-line and wrapped) in one place.

#[cfg(feature = "pdf")]
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ContoError, Result};
use crate::locale::parse_italian_amount;
use crate::models::{Bank, CanonicalTransaction};

const SECTION_START: &str = "TRANSAZIONI DI CONTO";
const SECTION_END: &str = "RIEPILOGO DEL PATRIMONIO";

const MONTHS: &[(&str, u32)] = &[
    ("GEN", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("APR", 4),
    ("MAG", 5),
    ("GIU", 6),
    ("LUG", 7),
    ("AGO", 8),
    ("SET", 9),
    ("OTT", 10),
    ("NOV", 11),
    ("DIC", 12),
];

/// Type/description keywords that mark an entry as inbound; everything else
/// is outbound.
const INBOUND_KEYWORDS: &[&str] = &[
    "BONIFICO",
    "DEPOSITO",
    "PAGAMENTO",
    "INTERESSI",
    "PREMIO",
    "ACCREDITO",
    "REDDITI",
    "CEDOLA",
    "RICOMPENSA",
];

/// Multi-word type labels, longest first, used to split `type_raw` off the
/// entry text. Anything unmatched falls back to the first word.
const KNOWN_TYPES: &[&str] = &[
    "Transazione con carta",
    "Pagamento degli interessi",
    "Commercio",
    "Bonifico",
    "Interessi",
    "Imposte",
    "Premio",
    "Prelievo",
    "Ricompensa",
];

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(\d{1,2})\s+(gen|feb|mar|apr|mag|giu|lug|ago|set|ott|nov|dic)\.?$")
            .unwrap()
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})(?:\s+(.+))?$").unwrap())
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-?\d{1,3}(?:\.\d{3})*,\d{2})\s*€").unwrap())
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn month_number(abbrev: &str) -> Option<u32> {
    let up = abbrev.to_uppercase();
    MONTHS.iter().find(|(m, _)| *m == up).map(|(_, n)| *n)
}

enum State {
    SeekingDate,
    SeekingYear { day: u32, month: u32 },
    Accumulating { date: String, fragments: Vec<String> },
}

#[cfg(feature = "pdf")]
pub fn parse(path: &Path) -> Result<Vec<CanonicalTransaction>> {
    let text = pdf_extract::extract_text(path)
        .map_err(|e| ContoError::Parse(format!("failed to extract PDF text: {e}")))?;
    parse_text(&text)
}

pub fn parse_text(text: &str) -> Result<Vec<CanonicalTransaction>> {
    let mut in_section = false;
    let mut section_seen = false;
    let mut state = State::SeekingDate;
    let mut transactions = Vec::new();

    for raw_line in text.lines() {
        let line = ws_re().replace_all(raw_line.trim(), " ").into_owned();
        if line.is_empty() {
            continue;
        }
        if !in_section {
            if line.to_uppercase().contains(SECTION_START) {
                in_section = true;
                section_seen = true;
            }
            continue;
        }
        if line.to_uppercase().contains(SECTION_END) {
            // a pending entry without amounts is not a transaction
            break;
        }

        state = step(state, &line, &mut transactions);
    }

    if !section_seen {
        return Err(ContoError::Parse(format!(
            "transaction section not found (missing '{SECTION_START}' marker)"
        )));
    }
    Ok(transactions)
}

fn step(state: State, line: &str, out: &mut Vec<CanonicalTransaction>) -> State {
    match state {
        State::SeekingDate => match parse_date_line(line) {
            // header line, page furniture, subtotals: ignored
            Some((day, month)) => State::SeekingYear { day, month },
            None => State::SeekingDate,
        },
        State::SeekingYear { day, month } => {
            if let Some(caps) = year_re().captures(line) {
                let year: i32 = caps[1].parse().unwrap_or(0);
                let date = format!("{year:04}-{month:02}-{day:02}");
                match caps.get(2).map(|m| m.as_str().trim().to_string()) {
                    Some(rest) if amount_re().is_match(&rest) => {
                        // single-line layout: the year line carries everything
                        if let Some(tx) = finish_entry(&date, &rest) {
                            out.push(tx);
                        }
                        State::SeekingDate
                    }
                    Some(rest) => State::Accumulating {
                        date,
                        fragments: vec![rest],
                    },
                    None => State::Accumulating {
                        date,
                        fragments: Vec::new(),
                    },
                }
            } else {
                // malformed entry, start over on this line
                step(State::SeekingDate, line, out)
            }
        }
        State::Accumulating { date, mut fragments } => {
            if amount_re().is_match(line) {
                fragments.push(line.to_string());
                let text = fragments.join(" ");
                if let Some(tx) = finish_entry(&date, &text) {
                    out.push(tx);
                }
                State::SeekingDate
            } else if let Some((day, month)) = parse_date_line(line) {
                // previous entry never produced an amount: drop it silently
                State::SeekingYear { day, month }
            } else {
                fragments.push(line.to_string());
                State::Accumulating { date, fragments }
            }
        }
    }
}

fn parse_date_line(line: &str) -> Option<(u32, u32)> {
    let caps = date_re().captures(line)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    if day == 0 || day > 31 {
        return None;
    }
    Some((day, month))
}

fn split_type(text: &str) -> String {
    for t in KNOWN_TYPES {
        if text.get(..t.len()).is_some_and(|p| p.eq_ignore_ascii_case(t)) {
            return (*t).to_string();
        }
    }
    text.split_whitespace().next().unwrap_or("").to_string()
}

fn is_inbound(text: &str) -> bool {
    let up = text.to_uppercase();
    INBOUND_KEYWORDS.iter().any(|k| up.contains(k))
}

fn finish_entry(date: &str, text: &str) -> Option<CanonicalTransaction> {
    let amounts: Vec<f64> = amount_re()
        .captures_iter(text)
        .filter_map(|c| parse_italian_amount(&c[1]))
        .collect();
    let first_amount_at = amount_re().find(text).map(|m| m.start()).unwrap_or(text.len());
    let description = text[..first_amount_at].trim().to_string();

    let (amount_in, amount_out, balance) = match amounts.len() {
        0 => return None,
        1 => directed(amounts[0], &description, None),
        2 => directed(amounts[0], &description, Some(amounts[1])),
        // separate in/out columns, balance last
        _ => (
            amounts[0].abs(),
            amounts[1].abs(),
            Some(amounts[amounts.len() - 1]),
        ),
    };
    if amount_in == 0.0 && amount_out == 0.0 {
        return None;
    }

    let description = if description.is_empty() {
        "N/A".to_string()
    } else {
        description
    };
    Some(CanonicalTransaction {
        bank: Bank::TradeRepublic,
        transaction_date: date.to_string(),
        // Trade Republic has no separate settlement date
        value_date: date.to_string(),
        type_raw: split_type(&description),
        description,
        amount_in,
        amount_out,
        balance,
        source_file: None,
    })
}

/// Assign a single amount to the in or out side: an explicit sign wins,
/// otherwise the income-keyword heuristic on the entry text decides.
fn directed(amount: f64, text: &str, balance: Option<f64>) -> (f64, f64, Option<f64>) {
    if amount < 0.0 {
        (0.0, amount.abs(), balance)
    } else if is_inbound(text) {
        (amount.abs(), 0.0, balance)
    } else {
        (0.0, amount.abs(), balance)
    }
}
