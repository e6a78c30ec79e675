//! Builds the self-contained JSON object handed to the extraction oracle.

use scraper::Html;
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::key::field_text;
use crate::record::{json_kind, SourceKind};

/// Ancestor fields inherited by a record, in insertion order.
pub type Context = Map<String, Value>;

/// One facility plus its inherited context, ready to be serialized as an
/// oracle request payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenedInput(Map<String, Value>);

impl FlattenedInput {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Compact JSON, non-ASCII left unescaped.
    pub fn to_compact_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// Merges ancestor context and the record's own fields. Context keys come
/// first; on a collision the record's value replaces the context value.
pub fn flatten(source_kind: SourceKind, context: &Context, record: &Value) -> Result<FlattenedInput> {
    let own = record
        .as_object()
        .ok_or(PipelineError::MalformedRecord {
            source_kind,
            found: json_kind(record),
        })?;

    let mut merged = context.clone();
    for (key, value) in own {
        merged.insert(key.clone(), value.clone());
    }
    Ok(FlattenedInput(merged))
}

/// Appends `combinedDescription`, the two description fields joined by a
/// newline. Missing descriptions count as empty.
pub fn add_combined_description(input: &mut FlattenedInput) {
    let combined = format!(
        "{}\n{}",
        field_text(input.get("Description1")),
        field_text(input.get("Description2"))
    );
    input.insert("combinedDescription", Value::String(combined));
}

/// Visible text of an HTML fragment, text nodes trimmed and joined by single
/// spaces.
pub fn html_to_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replaces each named string field with the text of its HTML. Missing and
/// non-string fields are left alone.
pub fn html_fields_to_text(input: &mut FlattenedInput, fields: &[&str]) {
    for field in fields {
        let text = match input.get(field) {
            Some(Value::String(html)) => html_to_text(html),
            _ => continue,
        };
        input.insert(*field, Value::String(text));
    }
}
