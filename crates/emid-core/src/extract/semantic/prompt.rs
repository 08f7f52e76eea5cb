//! Instruction sent with the retrieved chunks.

use crate::models::record::FieldKey;

/// The extraction instruction. It doubles as the retrieval query.
pub fn extraction_query() -> String {
    let keys: Vec<&str> = FieldKey::ALL.iter().map(FieldKey::as_str).collect();

    format!(
        "The context is text read from a United Arab Emirates identity card. \
         Extract the card holder's details and answer with one JSON object using only these keys: {}. \
         Ignore any text that is not in Latin script. \
         Leave out any key whose value does not appear in the context. \
         Write dates exactly as printed (YYYY/MM/DD). \
         Answer with the JSON object only, no other text.",
        keys.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_names_every_key() {
        let query = extraction_query();
        for key in FieldKey::ALL {
            assert!(query.contains(key.as_str()), "missing {}", key);
        }
        assert!(query.contains("JSON object only"));
    }
}
