//! Field keys and the extracted record.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel a language model uses to mark a field as absent.
pub const NOT_FOUND: &str = "not found";

/// Date layout printed on the card.
pub const CARD_DATE_FORMAT: &str = "%Y/%m/%d";

/// The closed set of fields that can be extracted from an ID card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Name,
    IdNumber,
    Nationality,
    PassportNo,
    Profession,
    Sponsor,
    PlaceOfIssue,
    IssueDate,
    ExpiryDate,
}

impl FieldKey {
    /// Every key, in display order.
    pub const ALL: [FieldKey; 9] = [
        FieldKey::Name,
        FieldKey::IdNumber,
        FieldKey::Nationality,
        FieldKey::PassportNo,
        FieldKey::Profession,
        FieldKey::Sponsor,
        FieldKey::PlaceOfIssue,
        FieldKey::IssueDate,
        FieldKey::ExpiryDate,
    ];

    /// Identity fields shown in the first display column.
    pub const PRIMARY: [FieldKey; 4] = [
        FieldKey::Name,
        FieldKey::IdNumber,
        FieldKey::Nationality,
        FieldKey::PassportNo,
    ];

    /// Residency fields shown in the second display column.
    pub const SECONDARY: [FieldKey; 5] = [
        FieldKey::Profession,
        FieldKey::Sponsor,
        FieldKey::PlaceOfIssue,
        FieldKey::IssueDate,
        FieldKey::ExpiryDate,
    ];

    /// Wire name of the key.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Name => "name",
            FieldKey::IdNumber => "id_number",
            FieldKey::Nationality => "nationality",
            FieldKey::PassportNo => "passport_no",
            FieldKey::Profession => "profession",
            FieldKey::Sponsor => "sponsor",
            FieldKey::PlaceOfIssue => "place_of_issue",
            FieldKey::IssueDate => "issue_date",
            FieldKey::ExpiryDate => "expiry_date",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::Name => "Name",
            FieldKey::IdNumber => "ID Number",
            FieldKey::Nationality => "Nationality",
            FieldKey::PassportNo => "Passport Number",
            FieldKey::Profession => "Profession",
            FieldKey::Sponsor => "Sponsor",
            FieldKey::PlaceOfIssue => "Place of Issue",
            FieldKey::IssueDate => "Issue Date",
            FieldKey::ExpiryDate => "Expiry Date",
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, FieldKey::IssueDate | FieldKey::ExpiryDate)
    }

    /// Map a loosely spelled key (as a language model may emit it) onto the
    /// closed set. Case, surrounding whitespace, spaces and dashes are ignored.
    pub fn normalize(raw: &str) -> Option<FieldKey> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        if let Ok(field) = key.parse() {
            return Some(field);
        }

        match key.as_str() {
            "full_name" => Some(FieldKey::Name),
            "id" | "id_no" | "idnumber" | "emirates_id" | "uid" | "uid_no" => Some(FieldKey::IdNumber),
            "passport" | "passport_number" | "passportno" => Some(FieldKey::PassportNo),
            "occupation" => Some(FieldKey::Profession),
            "issue_place" | "issuing_place" => Some(FieldKey::PlaceOfIssue),
            "date_of_issue" => Some(FieldKey::IssueDate),
            "expiration_date" | "date_of_expiry" | "expiry" => Some(FieldKey::ExpiryDate),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown field: {}", s))
    }
}

/// Raw key/value pairs produced by an extraction strategy, before the merge
/// gate. Keys are unchecked strings and values may be blank or sentinels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    entries: Vec<(String, String)>,
}

impl CandidateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CandidateRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// The final result of an extraction.
///
/// Only fields that were actually found are present: a value is never empty
/// and never the "not found" sentinel. Records are built by
/// [`ResultMerger`](crate::extract::ResultMerger).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractedRecord {
    fields: BTreeMap<FieldKey, String>,
}

impl ExtractedRecord {
    /// Insert a value already checked by the merge gate. The first value for
    /// a key wins.
    pub(crate) fn insert_checked(&mut self, key: FieldKey, value: String) -> bool {
        if self.fields.contains_key(&key) {
            return false;
        }
        self.fields.insert(key, value);
        true
    }

    pub fn get(&self, key: FieldKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.fields.contains_key(&key)
    }

    /// Present fields in [`FieldKey::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a date field (`YYYY/MM/DD`).
    pub fn date(&self, key: FieldKey) -> Option<NaiveDate> {
        if !key.is_date() {
            return None;
        }
        self.get(key)
            .and_then(|value| NaiveDate::parse_from_str(value, CARD_DATE_FORMAT).ok())
    }

    /// Convert back into a candidate, e.g. to run it through the merge gate again.
    pub fn to_candidate(&self) -> CandidateRecord {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect()
    }

    /// Check the record for plausibility issues.
    pub fn validate(&self, today: NaiveDate) -> Vec<String> {
        let mut issues = Vec::new();

        for key in [FieldKey::IssueDate, FieldKey::ExpiryDate] {
            if self.contains(key) && self.date(key).is_none() {
                issues.push(format!("{} is not a valid calendar date", key.label()));
            }
        }

        match (self.date(FieldKey::IssueDate), self.date(FieldKey::ExpiryDate)) {
            (Some(issue), Some(expiry)) if expiry < issue => {
                issues.push(format!("Expiry date {} is before issue date {}", expiry, issue));
            }
            _ => {}
        }

        if let Some(expiry) = self.date(FieldKey::ExpiryDate) {
            if expiry < today {
                issues.push(format!("Card expired on {}", expiry));
            }
        }

        if !self.contains(FieldKey::Name) {
            issues.push("Name not found".to_string());
        }
        if !self.contains(FieldKey::IdNumber) {
            issues.push("ID number not found".to_string());
        }

        issues
    }
}
