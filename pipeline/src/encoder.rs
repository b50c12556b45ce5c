//! Renders records to bytes
use crate::errors::{Error, Result};
use crate::fields::{Field, Value};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// Flattened view of a record: reserved fields first, then the renamed user, context and
/// static fields. Keys are unique once the collision rule has been applied.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenderedRecord {
    pub fields: Vec<Field>,
}

impl RenderedRecord {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.push(Field::new(key, value));
    }

    /// Adds a field, prefixing its key as many times as needed to keep keys unique
    pub fn push_unique(&mut self, key: impl Into<String>, value: impl Into<Value>, prefix: &str) {
        let mut key = key.into();
        if !prefix.is_empty() {
            while self.contains(&key) {
                key.insert_str(0, prefix);
            }
        }
        self.push(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }
}

pub trait Encoder: Send + Sync {
    fn encode(&self, record: &RenderedRecord) -> Result<Vec<u8>>;
}

pub type SharedEncoder = Arc<dyn Encoder>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    #[default]
    Json,
    Text,
}

impl EncoderKind {
    pub fn build(self) -> SharedEncoder {
        match self {
            EncoderKind::Json => Arc::new(JsonEncoder {}),
            EncoderKind::Text => Arc::new(TextEncoder {}),
        }
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderKind::Json => f.write_str("json"),
            EncoderKind::Text => f.write_str("text"),
        }
    }
}

impl FromStr for EncoderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(EncoderKind::Json),
            "text" => Ok(EncoderKind::Text),
            _ => Err(Error::UnsupportedEncoder(s.to_owned())),
        }
    }
}

/// One JSON object per record
pub struct JsonEncoder {}

impl Encoder for JsonEncoder {
    fn encode(&self, record: &RenderedRecord) -> Result<Vec<u8>> {
        let mut object = serde_json::Map::with_capacity(record.fields.len());
        for field in &record.fields {
            object.insert(field.key.clone(), field.value.clone());
        }
        Ok(serde_json::to_vec(&object)?)
    }
}

/// `key=value` pairs separated by spaces
pub struct TextEncoder {}

impl TextEncoder {
    fn needs_quotes(s: &str) -> bool {
        s.is_empty()
            || s.chars()
                .any(|c| c.is_whitespace() || c == '=' || c == '"' || c.is_control())
    }

    fn write_value(out: &mut String, value: &Value) -> Result<()> {
        match value {
            Value::String(s) if !Self::needs_quotes(s) => out.push_str(s),
            Value::String(s) => out.push_str(&serde_json::to_string(s)?),
            Value::Null => out.push_str("null"),
            other => out.push_str(&serde_json::to_string(other)?),
        }
        Ok(())
    }
}

impl Encoder for TextEncoder {
    fn encode(&self, record: &RenderedRecord) -> Result<Vec<u8>> {
        let mut out = String::with_capacity(record.fields.len() * 16);
        for (i, field) in record.fields.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            if Self::needs_quotes(&field.key) {
                return Err(Error::Encoding(format!("invalid key {:?}", field.key)));
            }
            out.push_str(&field.key);
            out.push('=');
            Self::write_value(&mut out, &field.value)?;
        }
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RenderedRecord {
        let mut record = RenderedRecord::default();
        record.push("level", "INFO");
        record.push("message", "hello world");
        record.push("custom.message", "mine");
        record.push("count", 3);
        record.push("tags", json!(["a", "b"]));
        record
    }

    #[test]
    fn test_json_encoder() {
        let bytes = JsonEncoder {}.encode(&sample()).unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            parsed,
            json!({
                "level": "INFO",
                "message": "hello world",
                "custom.message": "mine",
                "count": 3,
                "tags": ["a", "b"],
            })
        );
    }

    #[test]
    fn test_text_encoder() {
        let bytes = TextEncoder {}.encode(&sample()).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"level=INFO message="hello world" custom.message=mine count=3 tags=["a","b"]"#
        );
    }

    #[test]
    fn test_text_encoder_rejects_bad_keys() {
        let mut record = RenderedRecord::default();
        record.push("bad key", 1);
        assert!(TextEncoder {}.encode(&record).is_err());
    }

    #[test]
    fn test_encoder_kind() {
        assert_eq!("JSON".parse::<EncoderKind>().unwrap(), EncoderKind::Json);
        assert_eq!("text".parse::<EncoderKind>().unwrap(), EncoderKind::Text);
        assert!(matches!(
            "xml".parse::<EncoderKind>(),
            Err(Error::UnsupportedEncoder(_))
        ));
        assert_eq!(EncoderKind::Text.to_string(), "text");
    }
}
