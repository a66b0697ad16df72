//! Description normalization for the classification cache key.
//!
//! Strips the substrings that vary between occurrences of the same merchant
//! (dates, timestamps, transaction ids, long digit runs) so repeated
//! transactions land on the same cache entry. Deliberately lossy; the only
//! contract is determinism and idempotence.

use std::sync::OnceLock;

use regex::Regex;

const MAX_KEY_LEN: usize = 200;

fn date_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"\d{2}/\d{2}/\d{4}").unwrap(),
            Regex::new(r"\d{2}\.\d{2}\.\d{4}").unwrap(),
            Regex::new(r"\d{2}-\d{2}-\d{4}").unwrap(),
        ]
    })
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ORE \d{2}:\d{2}").unwrap())
}

fn del_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"DEL \d{2}/\d{2}/\d{2,4}").unwrap())
}

fn id_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ID\.\s*\d+").unwrap())
}

fn punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\sÀ-ÿ€]").unwrap())
}

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]{4,}").unwrap())
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Produce the stable cache key for a raw transaction description.
pub fn normalize_description(desc: &str) -> String {
    let mut s = desc.to_uppercase();
    for re in date_res() {
        s = re.replace_all(&s, "").into_owned();
    }
    s = time_re().replace_all(&s, "").into_owned();
    s = del_date_re().replace_all(&s, "").into_owned();
    s = id_marker_re().replace_all(&s, "").into_owned();
    s = punct_re().replace_all(&s, "").into_owned();
    // Digit runs last: stripping punctuation can fuse short digit groups
    // into a run that must not survive.
    s = digit_run_re().replace_all(&s, "").into_owned();
    s = ws_re().replace_all(&s, " ").into_owned();
    s.trim()
        .chars()
        .take(MAX_KEY_LEN)
        .collect::<String>()
        .trim_end()
        .to_string()
}
