//! Rendering extracted records.

use emid_core::models::record::{ExtractedRecord, FieldKey};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON object with the present fields only
    Json,
    /// CSV with a header row and one record row
    Csv,
    /// Two-column text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_record(record: &ExtractedRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_csv(record: &ExtractedRecord) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(FieldKey::ALL.iter().map(FieldKey::as_str))?;
    wtr.write_record(FieldKey::ALL.iter().map(|key| record.get(*key).unwrap_or("")))?;

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

/// Primary fields on the left, secondary on the right. Absent fields are
/// not shown.
fn format_text(record: &ExtractedRecord) -> String {
    if record.is_empty() {
        return "No fields found.\n".to_string();
    }

    let column = |keys: &[FieldKey]| -> Vec<String> {
        keys.iter()
            .filter_map(|key| record.get(*key).map(|value| format!("{:<16} {}", key.label(), value)))
            .collect()
    };
    let left = column(&FieldKey::PRIMARY);
    let right = column(&FieldKey::SECONDARY);

    let width = left.iter().map(|cell| cell.chars().count()).max().unwrap_or(0);
    let mut output = String::new();

    for row in 0..left.len().max(right.len()) {
        let l = left.get(row).map(String::as_str).unwrap_or("");
        match right.get(row) {
            Some(r) => output.push_str(&format!("{:<width$}    {}\n", l, r, width = width)),
            None => output.push_str(&format!("{}\n", l)),
        }
    }

    output
}
