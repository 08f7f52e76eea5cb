//! Reading the model's answer back into a candidate record.

use serde_json::Value;
use tracing::trace;

use crate::error::ModelOutputError;
use crate::extract::patterns::{canonical_emirate, EMIRATE_PATTERN, FALLBACK_PATTERNS};
use crate::models::record::{CandidateRecord, FieldKey};

/// Parse the first JSON object in `response`.
///
/// Code fences and surrounding prose are ignored. String values are kept,
/// numbers and booleans are stringified, anything else is dropped.
pub fn parse_json_record(response: &str) -> Result<CandidateRecord, ModelOutputError> {
    let start = response.find('{').ok_or(ModelOutputError::NoObject)?;
    let end = response.rfind('}').ok_or(ModelOutputError::NoObject)?;
    if end < start {
        return Err(ModelOutputError::NoObject);
    }

    let object = match serde_json::from_str::<Value>(&response[start..=end])? {
        Value::Object(map) => map,
        _ => return Err(ModelOutputError::NoObject),
    };

    let mut record = CandidateRecord::new();
    for (key, value) in object {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                trace!("Dropping non-scalar value for {}: {}", key, other);
                continue;
            }
        };
        record.insert(key, value);
    }

    Ok(record)
}

/// Best-effort recovery from a response that is not JSON.
pub fn fallback_extract(response: &str) -> CandidateRecord {
    let mut record = CandidateRecord::new();

    for pattern in FALLBACK_PATTERNS.iter() {
        if let Some(value) = pattern.capture(response) {
            record.insert(pattern.field.as_str(), value.trim());
        }
    }

    if let Some(emirate) = EMIRATE_PATTERN
        .find(response)
        .and_then(|m| canonical_emirate(m.as_str()))
    {
        record.insert(FieldKey::PlaceOfIssue.as_str(), emirate);
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(record: &CandidateRecord) -> Vec<(String, String)> {
        record
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_fenced_json() {
        let response = "Here you go:\n```json\n{\"name\": \"JANE DOE\", \"id_number\": \"784-1990-1234567-1\"}\n```";
        let record = parse_json_record(response).unwrap();
        assert_eq!(
            pairs(&record),
            vec![
                ("id_number".to_string(), "784-1990-1234567-1".to_string()),
                ("name".to_string(), "JANE DOE".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_stringifies_scalars_and_drops_nested() {
        let record =
            parse_json_record(r#"{"passport_no": 1234567, "sponsor": null, "x": [1], "ok": true}"#)
                .unwrap();
        assert_eq!(
            pairs(&record),
            vec![
                ("ok".to_string(), "true".to_string()),
                ("passport_no".to_string(), "1234567".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_json_record("I could not find any details."),
            Err(ModelOutputError::NoObject)
        ));
        assert!(matches!(
            parse_json_record("{name: JANE}"),
            Err(ModelOutputError::Json(_))
        ));
    }

    #[test]
    fn test_fallback_on_plain_text() {
        let record = fallback_extract("Name: JANE DOE");
        assert_eq!(pairs(&record), vec![("name".to_string(), "JANE DOE".to_string())]);
    }

    #[test]
    fn test_fallback_on_broken_json() {
        let record = fallback_extract(
            "{\"name\": \"JANE DOE\", \"passport_no\": \"Z1234567\", \"place_of_issue\": \"dubai\"",
        );
        assert_eq!(
            pairs(&record),
            vec![
                ("name".to_string(), "JANE DOE".to_string()),
                ("passport_no".to_string(), "Z1234567".to_string()),
                ("place_of_issue".to_string(), "Dubai".to_string()),
            ]
        );
    }

    #[test]
    fn test_fallback_on_nothing() {
        assert!(fallback_extract("no idea").is_empty());
    }
}
