//! Field names and values attached to records
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use serde_json::Value;

pub const DEFAULT_CUSTOM_PREFIX: &str = "custom.";

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K, V> From<(K, V)> for Field
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// Keys the framework writes on every record. User supplied fields can't take them over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultKey {
    Time,
    Level,
    Message,
    Error,
    Caller,
}

/// Output names of the reserved keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultKeys {
    pub time: String,
    pub level: String,
    pub message: String,
    pub error: String,
    pub caller: String,
}

impl Default for DefaultKeys {
    fn default() -> Self {
        Self {
            time: "time".into(),
            level: "level".into(),
            message: "message".into(),
            error: "error".into(),
            caller: "caller".into(),
        }
    }
}

impl DefaultKeys {
    pub fn name(&self, key: DefaultKey) -> &str {
        match key {
            DefaultKey::Time => &self.time,
            DefaultKey::Level => &self.level,
            DefaultKey::Message => &self.message,
            DefaultKey::Error => &self.error,
            DefaultKey::Caller => &self.caller,
        }
    }

    /// Renames one key, empty names are ignored
    pub fn set(&mut self, key: DefaultKey, name: impl Into<String>) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        match key {
            DefaultKey::Time => self.time = name,
            DefaultKey::Level => self.level = name,
            DefaultKey::Message => self.message = name,
            DefaultKey::Error => self.error = name,
            DefaultKey::Caller => self.caller = name,
        }
    }

    pub fn is_reserved(&self, key: &str) -> bool {
        key == self.time
            || key == self.level
            || key == self.message
            || key == self.error
            || key == self.caller
    }
}

/// Applies the collision rule to caller, context and static fields.
#[derive(Debug, Clone)]
pub struct FieldNamer {
    keys: DefaultKeys,
    prefix: String,
}

impl FieldNamer {
    /// An empty prefix falls back to [`DEFAULT_CUSTOM_PREFIX`]
    pub fn new(keys: DefaultKeys, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if prefix.is_empty() {
            prefix = DEFAULT_CUSTOM_PREFIX.to_owned();
        }
        Self { keys, prefix }
    }

    pub fn keys(&self) -> &DefaultKeys {
        &self.keys
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn user_key(&self, key: &str) -> String {
        if self.keys.is_reserved(key) {
            format!("{}{key}", self.prefix)
        } else {
            key.to_owned()
        }
    }

    pub fn rename(&self, field: Field) -> Field {
        if self.keys.is_reserved(&field.key) {
            Field {
                key: format!("{}{}", self.prefix, field.key),
                value: field.value,
            }
        } else {
            field
        }
    }
}

impl Default for FieldNamer {
    fn default() -> Self {
        Self::new(DefaultKeys::default(), DEFAULT_CUSTOM_PREFIX)
    }
}

/// Values carried along by the caller, typically request scoped (request id, user id...).
///
/// Only the [`ContextExtractor`] configured on the pipeline decides what ends up in the
/// rendered record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogContext {
    values: BTreeMap<String, Value>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub type ContextExtractor = Arc<dyn Fn(&LogContext) -> Vec<Field> + Send + Sync>;
pub type StaticFieldsParser = Arc<dyn Fn() -> Vec<Field> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_keys_are_prefixed() {
        let namer = FieldNamer::default();
        for key in ["time", "level", "message", "error", "caller"] {
            assert_eq!(namer.user_key(key), format!("custom.{key}"));
        }
        assert_eq!(namer.user_key("request_id"), "request_id");
        assert_eq!(namer.user_key("Message"), "Message");
    }

    #[test]
    fn test_renamed_default_key_changes_reserved_set() {
        let mut keys = DefaultKeys::default();
        keys.set(DefaultKey::Message, "msg");
        keys.set(DefaultKey::Level, "");
        let namer = FieldNamer::new(keys, "user.");
        assert_eq!(namer.user_key("msg"), "user.msg");
        assert_eq!(namer.user_key("message"), "message");
        assert_eq!(namer.user_key("level"), "user.level");
    }

    #[test]
    fn test_rename_keeps_value() {
        let namer = FieldNamer::default();
        let field = namer.rename(Field::new("error", "boom"));
        assert_eq!(field, Field::new("custom.error", "boom"));
    }

    #[test]
    fn test_default_key_names_and_empty_prefix() {
        let mut keys = DefaultKeys::default();
        keys.set(DefaultKey::Caller, "src");
        assert_eq!(keys.name(DefaultKey::Caller), "src");
        assert_eq!(keys.name(DefaultKey::Time), "time");
        let namer = FieldNamer::new(keys, "");
        assert_eq!(namer.prefix(), DEFAULT_CUSTOM_PREFIX);
        assert_eq!(namer.user_key("src"), "custom.src");
    }

    #[test]
    fn test_log_context() {
        let context = LogContext::new();
        assert!(context.is_empty());
        let context = context.with_value("request_id", "r1");
        assert!(!context.is_empty());
        assert_eq!(context.get("request_id"), Some(&Value::from("r1")));
    }
}
