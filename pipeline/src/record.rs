//! Pooled, mutable log event
use crate::fields::{Field, LogContext, Value};
use crate::levels::Level;
use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::Location;

/// One log event before rendering.
///
/// Records are handed out by the [`crate::pool::RecordPool`] and filled by the caller.
/// Once a record has been published every setter becomes a no-op, the event that went
/// out to the hooks is the one that was rendered.
#[derive(Debug)]
pub struct Record {
    level: Level,
    message: String,
    fields: Vec<Field>,
    error: Option<String>,
    caller: Option<&'static Location<'static>>,
    time: DateTime<Utc>,
    context: Option<LogContext>,
    published: bool,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    pub fn new() -> Self {
        Self {
            level: Level::Unset,
            message: String::new(),
            fields: Vec::new(),
            error: None,
            caller: None,
            time: Utc::now(),
            context: None,
            published: false,
        }
    }

    /// Back to the defined-empty state, allocations are kept for the next use.
    pub fn reset(&mut self) {
        self.level = Level::Unset;
        self.message.clear();
        self.fields.clear();
        self.error = None;
        self.caller = None;
        self.time = Utc::now();
        self.context = None;
        self.published = false;
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn caller(&self) -> Option<&'static Location<'static>> {
        self.caller
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn context(&self) -> Option<&LogContext> {
        self.context.as_ref()
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn is_empty(&self) -> bool {
        self.level == Level::Unset
            && self.message.is_empty()
            && self.fields.is_empty()
            && self.error.is_none()
            && self.caller.is_none()
            && self.context.is_none()
    }

    /// A second field with the same key replaces the value of the first one.
    pub fn with_field(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        if self.published {
            return self;
        }
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.key == key) {
            Some(existing) => existing.value = value,
            None => self.fields.push(Field { key, value }),
        }
        self
    }

    pub fn with_fields<I, F>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        for field in fields {
            let field = field.into();
            self.with_field(field.key, field.value);
        }
        self
    }

    pub fn with_error(&mut self, err: impl fmt::Display) -> &mut Self {
        if !self.published {
            self.error = Some(err.to_string());
        }
        self
    }

    pub fn with_caller(&mut self, caller: &'static Location<'static>) -> &mut Self {
        if !self.published {
            self.caller = Some(caller);
        }
        self
    }

    pub fn with_time(&mut self, time: DateTime<Utc>) -> &mut Self {
        if !self.published {
            self.time = time;
        }
        self
    }

    pub fn with_context(&mut self, context: LogContext) -> &mut Self {
        if !self.published {
            self.context = Some(context);
        }
        self
    }

    pub fn with_level(&mut self, level: Level) -> &mut Self {
        if !self.published {
            self.level = level;
        }
        self
    }

    pub fn with_message(&mut self, message: &str) -> &mut Self {
        if !self.published {
            self.message.clear();
            self.message.push_str(message);
        }
        self
    }

    /// Freezes the record, called by the dispatcher when the record leaves the caller.
    pub(crate) fn mark_published(&mut self) {
        self.published = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_field_replaces_value() {
        let mut record = Record::new();
        record.with_field("id", 1).with_field("id", 2);
        assert_eq!(record.fields(), &[Field::new("id", 2)]);
    }

    #[test]
    fn test_setters_are_noops_once_published() {
        let mut record = Record::new();
        record.with_level(Level::Info).with_message("before");
        record.mark_published();
        record
            .with_level(Level::Error)
            .with_message("after")
            .with_field("k", "v")
            .with_error("boom")
            .with_context(LogContext::new().with_value("a", 1));
        assert_eq!(record.level(), Level::Info);
        assert_eq!(record.message(), "before");
        assert!(record.fields().is_empty());
        assert!(record.error().is_none());
        assert!(record.context().is_none());
    }

    #[test]
    fn test_reset() {
        let mut record = Record::new();
        record
            .with_level(Level::Warn)
            .with_message("msg")
            .with_fields([("a", 1), ("b", 2)])
            .with_error("boom")
            .with_caller(Location::caller());
        record.mark_published();
        record.reset();
        assert!(record.is_empty());
        assert!(!record.is_published());
    }
}
