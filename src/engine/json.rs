use crate::engine::error::{Result, UpsertError};
use serde_json::Value as JsonValue;

/// Turns structured column values into text before they are bound.
pub trait JsonSerializer: Send + Sync {
    fn serialize(&self, column: &str, value: &JsonValue) -> Result<String>;
}

/// Single-line JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactJson;

impl JsonSerializer for CompactJson {
    fn serialize(&self, column: &str, value: &JsonValue) -> Result<String> {
        serde_json::to_string(value).map_err(|e| UpsertError::Json {
            column: column.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Indented JSON, for stores where the text is read by humans.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrettyJson;

impl JsonSerializer for PrettyJson {
    fn serialize(&self, column: &str, value: &JsonValue) -> Result<String> {
        serde_json::to_string_pretty(value).map_err(|e| UpsertError::Json {
            column: column.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Serializer selection, made once at configuration time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum JsonStyle {
    #[default]
    Compact,
    Pretty,
}

impl JsonStyle {
    pub fn serializer(self) -> Box<dyn JsonSerializer> {
        match self {
            JsonStyle::Compact => Box::new(CompactJson),
            JsonStyle::Pretty => Box::new(PrettyJson),
        }
    }
}
