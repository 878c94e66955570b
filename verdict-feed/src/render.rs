//! Defendant grouping and HTML fragment rendering
//!
//! Records are grouped by `name_full`. A group renders when its second
//! record arrives, so fragments come out in second-arrival order.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::feed::RawRecord;
use crate::normalize::{normalize_charge, slugify, VerdictTable, ENHANCER_CHARGE};
use std::borrow::Cow;
use std::collections::HashMap;

/// Per-deployment rendering choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub table: VerdictTable,
    /// Drop the colon after the sentence-enhancer count
    pub suppress_enhancer_colon: bool,
}

/// A record ready for markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    pub name_full: String,
    pub charge: String,
    pub verdict: String,
    pub slug: String,
    pub verdict_slug: String,
}

impl DisplayRecord {
    /// Normalize one raw record. Unknown verdict codes are reported.
    pub fn from_raw(
        raw: &RawRecord,
        settings: &RenderSettings,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let verdict = match settings.table.label(&raw.verdict) {
            Some(label) => label,
            None => {
                diagnostics.push(Diagnostic::UnknownCode {
                    name: raw.name_full.clone(),
                    code: raw.verdict.clone(),
                });
                ""
            }
        };

        Self {
            name_full: raw.name_full.clone(),
            charge: normalize_charge(&raw.charge).to_string(),
            verdict: verdict.to_string(),
            slug: slugify(&raw.name_full),
            verdict_slug: slugify(verdict),
        }
    }
}

/// Colon between charge and verdict for one record
pub fn colon_for(record: &DisplayRecord, settings: &RenderSettings) -> &'static str {
    if settings.suppress_enhancer_colon && record.charge == ENHANCER_CHARGE {
        ""
    } else {
        ":"
    }
}

/// One `<li>` line for a charge
pub fn charge_markup(record: &DisplayRecord, colon: &str) -> String {
    format!(
        "    <li>{}{} <span class=\"verdict {}\">{}</span></li>\n",
        escape_html(&record.charge),
        colon,
        record.verdict_slug,
        escape_html(&record.verdict)
    )
}

/// One defendant block: heading plus the charge list
pub fn item_markup(primary: &DisplayRecord, charges_markup: &str) -> String {
    format!(
        "\n<h4 class=\"victim\" id=\"{}\">{}</h4>\n<ul class=\"charges\">\n{}</ul>",
        primary.slug,
        escape_html(&primary.name_full),
        charges_markup
    )
}

/// Render a completed pair
pub fn pair_markup(
    first: &RawRecord,
    second: &RawRecord,
    settings: &RenderSettings,
    diagnostics: &mut Diagnostics,
) -> String {
    let first = DisplayRecord::from_raw(first, settings, diagnostics);
    let second = DisplayRecord::from_raw(second, settings, diagnostics);

    let mut charges = charge_markup(&first, colon_for(&first, settings));
    charges.push_str(&charge_markup(&second, colon_for(&second, settings)));
    item_markup(&first, &charges)
}

enum GroupState {
    /// First record seen, index into the input
    Pending(usize),
    /// Pair rendered; count of records seen after it
    Rendered(usize),
}

/// Group records by defendant and render each completed pair.
///
/// Single-record groups and records beyond the second are reported, not
/// rendered. Output order is the order in which each pair completed.
pub fn render_pass(
    records: &[RawRecord],
    settings: &RenderSettings,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let mut groups: HashMap<&str, GroupState> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    let mut fragments = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let key = record.name_full.as_str();
        match groups.get_mut(key) {
            None => {
                groups.insert(key, GroupState::Pending(index));
                first_seen.push(key);
            }
            Some(state) => match state {
                GroupState::Pending(first) => {
                    fragments.push(pair_markup(&records[*first], record, settings, diagnostics));
                    *state = GroupState::Rendered(0);
                }
                GroupState::Rendered(extra) => *extra += 1,
            },
        }
    }

    for key in first_seen {
        match groups.get(key) {
            Some(GroupState::Pending(_)) => diagnostics.push(Diagnostic::UnpairedDefendant {
                name: key.to_string(),
            }),
            Some(GroupState::Rendered(extra)) if *extra > 0 => {
                diagnostics.push(Diagnostic::OversizedGroup {
                    name: key.to_string(),
                    extra: *extra,
                })
            }
            _ => {}
        }
    }

    fragments
}

/// Escape text content for HTML
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
