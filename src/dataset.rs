//! Dataset import and export.
//!
//! Import is deliberately permissive: a root array of rows, or an object
//! wrapping one (`{"data": [...]}`). A row may be a bare string or an object
//! whose text lives under one of several common keys.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::DatasetError;
use crate::types::{sequence_id, WorkItem};

/// Keys probed for row text, in priority order.
pub const TEXT_KEYS: &[&str] = &[
    "text",
    "original",
    "content",
    "message",
    "prompt",
    "input",
    "instruction",
    "dialogue",
    "question",
];

const SAMPLE_ROWS: &[(&str, &str)] = &[
    ("1", "hey u there? need help with api wont work"),
    ("2", "customer service was bad i want refund now"),
    ("3", "wat time is the meeting 2moro?"),
    ("4", "this code is buggy fix it plz"),
    ("5", "tell me joke about ai"),
];

/// Parse uploaded JSON into fresh Idle work items.
///
/// Rows without usable text are skipped. Fails with
/// [`DatasetError::NoTextContent`] if every row was skipped.
pub fn parse_dataset(json: &str) -> Result<Vec<WorkItem>, DatasetError> {
    let parsed: Value = serde_json::from_str(json)?;
    let rows = rows_of(&parsed)?;

    let mut items = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let Some(text) = row_text(row) else {
            debug!(row = idx, "Skipping row without text");
            continue;
        };
        let id = row_id(row).unwrap_or_else(|| sequence_id(idx));
        items.push(WorkItem::new(id, text));
    }

    if items.is_empty() {
        return Err(DatasetError::NoTextContent);
    }

    let skipped = rows.len() - items.len();
    info!(loaded = items.len(), skipped, "Parsed dataset");
    Ok(items)
}

/// The built-in five-row demo dataset.
pub fn sample_dataset() -> Vec<WorkItem> {
    SAMPLE_ROWS
        .iter()
        .map(|(id, text)| WorkItem::new(*id, *text))
        .collect()
}

/// Pretty-printed JSON array of the items in export shape.
pub fn export_json(items: &[WorkItem]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(items)
}

fn rows_of(parsed: &Value) -> Result<&Vec<Value>, DatasetError> {
    match parsed {
        Value::Array(rows) => Ok(rows),
        Value::Object(map) => {
            let (key, rows) = map
                .iter()
                .find_map(|(k, v)| v.as_array().map(|rows| (k, rows)))
                .ok_or_else(|| {
                    DatasetError::InvalidStructure(
                        "JSON must be an array or contain an array property".to_string(),
                    )
                })?;
            debug!(key = %key, "Found rows under wrapper key");
            Ok(rows)
        }
        _ => Err(DatasetError::InvalidStructure(
            "root element must be an array or object".to_string(),
        )),
    }
}

fn row_text(row: &Value) -> Option<String> {
    match row {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(fields) => known_key_text(fields).or_else(|| first_string(fields)),
        _ => None,
    }
}

fn known_key_text(fields: &Map<String, Value>) -> Option<String> {
    TEXT_KEYS.iter().find_map(|key| match fields.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn first_string(fields: &Map<String, Value>) -> Option<String> {
    fields.values().find_map(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
