pub mod completions;
pub mod config;
pub mod emit;
pub mod listeners;
pub mod replay;

/// Parse a CLI/session payload: JSON if it parses, otherwise the raw text as a JSON string
pub fn parse_payload(raw: Option<&str>) -> serde_json::Value {
    match raw {
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string())),
        None => serde_json::Value::Null,
    }
}
