use std::path::Path;

use anyhow::{Context, Result};

use crate::core::error::GoldError;
use crate::core::model::LabeledExample;

pub const SENTENCE_COLUMN: &str = "sentence";
pub const SECTION_COLUMN: &str = "text_section";
pub const LABEL_COLUMN: &str = "label_specific_target(0/1)";

/// Load the hand-labeled gold CSV.
pub fn load_gold(path: &Path) -> Result<Vec<LabeledExample>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read gold file: {}", path.display()))?;
    parse_gold(&data).with_context(|| format!("Malformed gold file: {}", path.display()))
}

pub fn parse_gold(data: &str) -> std::result::Result<Vec<LabeledExample>, GoldError> {
    let mut records = parse_csv(data)?.into_iter();
    let (_, header) = records.next().ok_or(GoldError::Empty)?;

    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| GoldError::MissingColumn(name.to_string()))
    };
    let sentence_idx = column(SENTENCE_COLUMN)?;
    let label_idx = column(LABEL_COLUMN)?;
    let section_idx = column(SECTION_COLUMN).ok();

    records
        .map(|(line, fields)| {
            let field = |idx: usize, name: &str| {
                fields.get(idx).ok_or_else(|| GoldError::Row {
                    line,
                    message: format!("missing {name:?} field"),
                })
            };

            let text = field(sentence_idx, SENTENCE_COLUMN)?.trim().to_string();
            let raw_label = field(label_idx, LABEL_COLUMN)?.trim();
            let label = match raw_label.parse::<i64>() {
                Ok(0) => 0,
                Ok(1) => 1,
                _ => {
                    return Err(GoldError::Row {
                        line,
                        message: format!("label must be 0 or 1, got {raw_label:?}"),
                    })
                }
            };
            let section = section_idx
                .and_then(|idx| fields.get(idx))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();

            Ok(LabeledExample {
                text,
                section,
                label,
            })
        })
        .collect()
}

/// Split CSV text into records, each tagged with its starting line.
///
/// Handles quoted fields with embedded commas, doubled quotes and newlines.
/// Blank lines are skipped.
fn parse_csv(data: &str) -> std::result::Result<Vec<(usize, Vec<String>)>, GoldError> {
    let data = data.strip_prefix('\u{feff}').unwrap_or(data);

    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = data.chars().peekable();

    let mut finish_record =
        |record: &mut Vec<String>, field: &mut String, quoted: bool, start: usize| {
            if !record.is_empty() || !field.is_empty() || quoted {
                record.push(std::mem::take(field));
                records.push((start, std::mem::take(record)));
            }
        };

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                finish_record(&mut record, &mut field, quoted, record_line);
                quoted = false;
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(GoldError::Row {
            line: record_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    finish_record(&mut record, &mut field, quoted, record_line);

    Ok(records)
}
