//! Regex tables for ID card fields.
//!
//! Each card pattern is `label`, a separator (colon, line break, or two or
//! more spaces), then a value restricted to the field's shape. Values never
//! cross a line break, so the next line's label cannot be captured. The
//! regex crate has no lookahead; a trailing non-capturing group stands in for
//! the boundary check and only group 1 is ever read.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::record::FieldKey;

/// A field and the pattern whose first capture group is its value.
#[derive(Debug)]
pub struct FieldPattern {
    pub field: FieldKey,
    pub regex: Regex,
}

impl FieldPattern {
    fn new(field: FieldKey, pattern: &str) -> Self {
        Self {
            field,
            regex: Regex::new(pattern).unwrap(),
        }
    }

    /// First captured value in `text`, untrimmed.
    pub fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Card pattern template: label, separator, then a value of `$first`
/// followed by `$rest` characters, single spaces allowed between runs.
///
/// A value ends at a line break, at two or more spaces (column layouts), or
/// at a character outside its class. A value followed by `:` is the next
/// field's label and does not match.
macro_rules! labeled {
    ($label:literal, $first:literal, $rest:literal) => {
        concat!(
            r"(?i)",
            $label,
            r"\s*(?:[:\n]|[ \t]{2,})\s*",
            r"([", $first, r"](?:[ \t]?[", $rest, r"])*)",
            r"(?:[ \t]{2,}|[ \t]*(?:[^", $rest, r" \t:]|$))"
        )
    };
}

/// Fallback key prefix: line start, sentence start or JSON member start,
/// the optionally quoted key, then `:` or `=`.
macro_rules! fallback_key {
    ($key:literal) => {
        concat!(
            r#"(?im)(?:^|[{,.!?;])[ \t]*["']?"#,
            $key,
            r#"["']?[ \t]*[:=][ \t]*["']?"#
        )
    };
}

/// The seven Emirates, as printed in "Place of Issue".
pub const EMIRATES: [&str; 7] = [
    "Abu Dhabi",
    "Dubai",
    "Sharjah",
    "Ajman",
    "Umm Al Quwain",
    "Ras Al Khaimah",
    "Fujairah",
];

lazy_static! {
    /// Card patterns, one per field, in [`FieldKey::ALL`] order.
    pub static ref CARD_PATTERNS: Vec<FieldPattern> = vec![
        FieldPattern::new(FieldKey::Name, labeled!(r"\bName\b", r"A-Z", r"A-Z'.\-")),
        FieldPattern::new(
            FieldKey::IdNumber,
            labeled!(
                r"(?:\bID[ \t]*Number|\bU\.?I\.?D\.?[ \t]*No\.?)",
                r"A-Z0-9",
                r"A-Z0-9/\-"
            ),
        ),
        FieldPattern::new(FieldKey::Nationality, labeled!(r"\bNationality\b", r"A-Z", r"A-Z")),
        FieldPattern::new(
            FieldKey::PassportNo,
            concat!(
                r"(?i)\bPassport[ \t]*(?:No\.?|Number)",
                r"\s*(?:[:\n]|[ \t]{2,})\s*",
                r"([A-Z0-9]+)(?:[^A-Z0-9:]|$)"
            ),
        ),
        FieldPattern::new(FieldKey::Profession, labeled!(r"\bProfession\b", r"A-Z(", r"A-Z()/\-")),
        FieldPattern::new(FieldKey::Sponsor, labeled!(r"\bSponsor\b", r"A-Z0-9", r"A-Z0-9&.,\-")),
        FieldPattern::new(
            FieldKey::PlaceOfIssue,
            labeled!(r"\bPlace[ \t]*of[ \t]*Issue\b", r"A-Z", r"A-Z"),
        ),
        FieldPattern::new(
            FieldKey::IssueDate,
            concat!(
                r"(?i)\bIssu(?:e|ing)[ \t]*Date\b",
                r"\s*(?:[:\n]|[ \t]{2,})\s*",
                r"(\d{4}/\d{2}/\d{2})(?:\D|$)"
            ),
        ),
        FieldPattern::new(
            FieldKey::ExpiryDate,
            concat!(
                r"(?i)\bExpiry[ \t]*Date\b",
                r"\s*(?:[:\n]|[ \t]{2,})\s*",
                r"(\d{4}/\d{2}/\d{2})(?:\D|$)"
            ),
        ),
    ];

    /// Any card label at the start of a value. A value that begins with a
    /// label was read from a label-only line and is discarded.
    pub static ref LABEL_PREFIX: Regex = Regex::new(concat!(
        r"(?i)^(?:Name|ID[ \t]*Number|U\.?I\.?D\.?[ \t]*No|Nationality",
        r"|Passport[ \t]*(?:No|Number)|Profession|Sponsor|Place[ \t]*of[ \t]*Issue",
        r"|Issu(?:e|ing)[ \t]*Date|Expiry[ \t]*Date)\b"
    ))
    .unwrap();

    /// Reduced patterns run over a raw model response that failed to parse.
    /// They tolerate JSON-ish quoting (`"name": "JANE DOE"`) as well as
    /// `Name: JANE DOE`. Keys must open a line, a sentence or a JSON member,
    /// so `Sponsor Name: ...` is not read as the holder's name.
    pub static ref FALLBACK_PATTERNS: Vec<FieldPattern> = vec![
        FieldPattern::new(
            FieldKey::Name,
            concat!(fallback_key!(r"name"), r#"([^"'\n,{}]+)"#),
        ),
        FieldPattern::new(
            FieldKey::IdNumber,
            concat!(fallback_key!(r"id[ _]?(?:number|no)"), r"([0-9][0-9 \-]*[0-9])"),
        ),
        FieldPattern::new(
            FieldKey::Nationality,
            concat!(fallback_key!(r"nationality"), r#"([^"'\n,{}]+)"#),
        ),
        FieldPattern::new(FieldKey::PassportNo, r"\b(Z\d{7})\b"),
        FieldPattern::new(
            FieldKey::Profession,
            concat!(fallback_key!(r"profession"), r#"([^"'\n,{}]+)"#),
        ),
    ];

    /// Any of the seven Emirates, tolerant of spacing and dashes.
    pub static ref EMIRATE_PATTERN: Regex = Regex::new(
        r"(?i)\b(Abu[ \t]*Dhabi|Dubai|Sharjah|Ajman|Umm[ \t]*Al[ \t\-]*Quwain|Ras[ \t]*Al[ \t\-]*Khaimah|Fujairah)\b"
    ).unwrap();
}

/// Canonical Emirate name for a matched spelling.
pub fn canonical_emirate(matched: &str) -> Option<&'static str> {
    let squashed: String = matched
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    EMIRATES.iter().copied().find(|emirate| {
        let candidate: String = emirate
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        candidate == squashed
    })
}
