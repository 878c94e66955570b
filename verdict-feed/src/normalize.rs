//! Field normalization: readable charges, verdict labels, URL-safe slugs

use serde::Deserialize;

/// Charge text that never takes a colon before its verdict, when the
/// suppression rule is enabled
pub const ENHANCER_CHARGE: &str = "Crime of violence (sentence enhancer)";

/// Shorten the four long statutory charge phrasings.
///
/// Exact match only; any other text is returned unchanged.
pub fn normalize_charge(charge: &str) -> &str {
    match charge {
        "Murder in the first degree, after deliberation and with intent" => {
            "Murder, first degree, with intent"
        }
        "Murder in the first degree, with \"universal malice manifesting extreme indifference\"" => {
            "Murder, first degree, with extreme indifference"
        }
        "Attempted murder in the first degree, after deliberation and with intent" => {
            "Attempted murder, first degree, with intent"
        }
        "Attempted murder in the first degree, with \"universal malice manifesting extreme indifference\"" => {
            "Attempted murder, first degree, with extreme indifference"
        }
        other => other,
    }
}

/// Verdict code table. Each deployment uses exactly one; they are not merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VerdictTable {
    /// Penalty phase: 0 = death penalty, 1 = life in prison
    Sentencing,
    /// Guilt phase: 0 = NGRI, 1 = guilty, 2 = not guilty
    Trial,
}

impl VerdictTable {
    /// Label for a code. `""` (no verdict yet) maps to `""`; codes outside
    /// the table return `None`.
    pub fn label(self, code: &str) -> Option<&'static str> {
        match (self, code) {
            (_, "") => Some(""),
            (VerdictTable::Sentencing, "0") => Some("Death penalty"),
            (VerdictTable::Sentencing, "1") => Some("Life in prison"),
            (VerdictTable::Trial, "0") => Some("Not guilty by reason of insanity"),
            (VerdictTable::Trial, "1") => Some("Guilty"),
            (VerdictTable::Trial, "2") => Some("Not guilty"),
            _ => None,
        }
    }

    /// Label for a code, degrading unknown codes to `""`
    pub fn normalize_verdict(self, code: &str) -> &'static str {
        self.label(code).unwrap_or("")
    }
}

/// URL-safe identifier.
///
/// Lowercases, turns whitespace runs into `-`, drops everything outside
/// `[a-z0-9_-]`, collapses `-` runs and trims `-` from both ends.
/// Idempotent.
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut slug = String::with_capacity(lower.len());

    for c in lower.chars() {
        // U+FEFF counts as whitespace in feed text
        let c = if c.is_whitespace() || c == '\u{FEFF}' { '-' } else { c };
        let keep = c.is_ascii_alphanumeric() || c == '_' || c == '-';
        if !keep {
            continue;
        }
        // Leading or repeated hyphen
        if c == '-' && (slug.is_empty() || slug.ends_with('-')) {
            continue;
        }
        slug.push(c);
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
