//! Where records are gated, rendered and fanned out to the hooks
use crate::encoder::{RenderedRecord, SharedEncoder};
use crate::errors::{Error, Result};
use crate::fields::{ContextExtractor, DefaultKey, Field, FieldNamer};
use crate::hook::SharedHook;
use crate::levels::Level;
use crate::record::Record;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// What happened to a record handed to [`Dispatcher::publish`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// below the minimum level, not rendered
    GatedOut,
    /// the encoder failed, no hook was notified
    RenderFailed,
    /// number of hooks notified
    Dispatched(usize),
}

pub struct Dispatcher {
    min_level: AtomicU8,
    hooks: RwLock<HashMap<Level, HashMap<String, SharedHook>>>,
    encoder: SharedEncoder,
    namer: FieldNamer,
    time_format: String,
    static_fields: Vec<Field>,
    context_extractor: Option<ContextExtractor>,
}

impl Dispatcher {
    pub fn new(
        min_level: Level,
        encoder: SharedEncoder,
        namer: FieldNamer,
        time_format: String,
        static_fields: Vec<Field>,
        context_extractor: Option<ContextExtractor>,
    ) -> Self {
        let static_fields = static_fields.into_iter().map(|f| namer.rename(f)).collect();
        Self {
            min_level: AtomicU8::new(min_level as u8),
            hooks: RwLock::new(HashMap::new()),
            encoder,
            namer,
            time_format,
            static_fields,
            context_extractor,
        }
    }

    pub fn min_level(&self) -> Level {
        Level::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    pub fn set_min_level(&self, level: Level) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.min_level()
    }

    pub fn namer(&self) -> &FieldNamer {
        &self.namer
    }

    /// Inserts or replaces the hook registered under `(level, hook.name())`
    pub fn register_hook(&self, level: Level, hook: SharedHook) {
        let mut hooks = self.hooks.write().unwrap();
        hooks
            .entry(level)
            .or_default()
            .insert(hook.name().to_owned(), hook);
    }

    /// Returns false if nothing was registered under that name
    pub fn deregister_hook(&self, level: Level, name: &str) -> bool {
        let mut hooks = self.hooks.write().unwrap();
        let Some(level_hooks) = hooks.get_mut(&level) else {
            return false;
        };
        let removed = level_hooks.remove(name).is_some();
        if level_hooks.is_empty() {
            hooks.remove(&level);
        }
        removed
    }

    pub fn hook_names(&self, level: Level) -> Vec<String> {
        let hooks = self.hooks.read().unwrap();
        hooks
            .get(&level)
            .map(|level_hooks| level_hooks.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn hooks_for(&self, level: Level) -> Vec<SharedHook> {
        let hooks = self.hooks.read().unwrap();
        let mut selected = Vec::new();
        if let Some(catch_all) = hooks.get(&Level::Unset) {
            selected.extend(catch_all.values().cloned());
        }
        if !level.is_catch_all()
            && let Some(level_hooks) = hooks.get(&level)
        {
            selected.extend(level_hooks.values().cloned());
        }
        selected
    }

    /// Notifies the catch-all hooks, then the hooks of `level`.
    ///
    /// The registry lock is released before any hook runs, a hook may register or
    /// deregister hooks from `publish`.
    pub fn dispatch(&self, level: Level, bytes: &Bytes) -> usize {
        let hooks = self.hooks_for(level);
        for hook in &hooks {
            hook.publish(bytes);
        }
        hooks.len()
    }

    /// Reserved fields come first, every other field is renamed until its key is unique.
    pub fn render(&self, record: &Record) -> Result<RenderedRecord> {
        let keys = self.namer.keys();
        let prefix = self.namer.prefix();
        let mut rendered =
            RenderedRecord::with_capacity(5 + record.fields().len() + self.static_fields.len());

        let mut time = String::new();
        write!(&mut time, "{}", record.time().format(&self.time_format))
            .map_err(|_| Error::InvalidTimeFormat(self.time_format.clone()))?;
        rendered.push(keys.name(DefaultKey::Time), time);
        rendered.push(keys.name(DefaultKey::Level), record.level().as_str());
        rendered.push(keys.name(DefaultKey::Message), record.message());
        if let Some(err) = record.error() {
            rendered.push(keys.name(DefaultKey::Error), err);
        }
        if let Some(caller) = record.caller() {
            rendered.push(
                keys.name(DefaultKey::Caller),
                format!("{}:{}", caller.file(), caller.line()),
            );
        }

        for field in record.fields() {
            rendered.push_unique(self.namer.user_key(&field.key), field.value.clone(), prefix);
        }
        if let (Some(extract), Some(context)) = (&self.context_extractor, record.context())
            && !context.is_empty()
        {
            for field in extract(context) {
                let field = self.namer.rename(field);
                rendered.push_unique(field.key, field.value, prefix);
            }
        }
        for field in &self.static_fields {
            rendered.push_unique(field.key.clone(), field.value.clone(), prefix);
        }
        Ok(rendered)
    }

    pub fn encode(&self, record: &Record) -> Result<Bytes> {
        let rendered = self.render(record)?;
        Ok(Bytes::from(self.encoder.encode(&rendered)?))
    }

    /// Gate, render and fan out. The record is frozen whatever the outcome.
    pub fn publish(&self, record: &mut Record) -> DispatchOutcome {
        record.mark_published();
        let level = record.level();
        if !self.is_enabled(level) {
            return DispatchOutcome::GatedOut;
        }
        match self.encode(record) {
            Ok(bytes) => DispatchOutcome::Dispatched(self.dispatch(level, &bytes)),
            Err(e) => {
                tracing::debug!("dropping {level} record: {e}");
                DispatchOutcome::RenderFailed
            }
        }
    }
}
