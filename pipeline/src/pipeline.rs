//! Explicitly constructed context shared by every producer of records
use crate::config::PipelineConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::encoder::SharedEncoder;
use crate::errors::Result;
use crate::fields::{ContextExtractor, Field, FieldNamer, LogContext, StaticFieldsParser, Value};
use crate::hook::SharedHook;
use crate::levels::Level;
use crate::pool::{PooledRecord, RecordPool};
use crate::record::Record;
use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub struct Pipeline {
    config: PipelineConfig,
    pool: RecordPool,
    dispatcher: Dispatcher,
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    encoder: Option<SharedEncoder>,
    static_fields: Option<StaticFieldsParser>,
    context_extractor: Option<ContextExtractor>,
}

impl PipelineBuilder {
    /// Replaces the encoder selected by the configuration
    #[must_use]
    pub fn with_encoder(mut self, encoder: SharedEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Evaluated once, when the pipeline is built
    #[must_use]
    pub fn with_static_fields(mut self, parser: StaticFieldsParser) -> Self {
        self.static_fields = Some(parser);
        self
    }

    #[must_use]
    pub fn with_context_extractor(mut self, extractor: ContextExtractor) -> Self {
        self.context_extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Result<Arc<Pipeline>> {
        let config = self.config.sanitized();
        config.validate()?;
        let encoder = self.encoder.unwrap_or_else(|| config.encoder.build());
        let static_fields = self.static_fields.map(|parse| parse()).unwrap_or_default();
        let namer = FieldNamer::new(config.default_keys.clone(), config.custom_prefix.clone());
        let dispatcher = Dispatcher::new(
            config.min_level,
            encoder,
            namer,
            config.time_format.clone(),
            static_fields,
            self.context_extractor,
        );
        let pool = RecordPool::new(config.pool_retain.max(config.pool_prewarm));
        pool.prewarm(config.pool_prewarm);
        Ok(Arc::new(Pipeline {
            config,
            pool,
            dispatcher,
        }))
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Arc<Self>> {
        Self::builder(config).build()
    }

    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            encoder: None,
            static_fields: None,
            context_extractor: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pool(&self) -> &RecordPool {
        &self.pool
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn register_hook(&self, level: Level, hook: SharedHook) {
        self.dispatcher.register_hook(level, hook);
    }

    pub fn deregister_hook(&self, level: Level, name: &str) -> bool {
        self.dispatcher.deregister_hook(level, name)
    }

    /// Acquires a record from the pool
    pub fn entry(&self) -> Entry<'_> {
        Entry {
            pipeline: self,
            record: Some(self.pool.acquire()),
        }
    }

    /// Dispatches a filled record and gives it back to the pool
    pub fn publish(&self, mut record: PooledRecord) -> DispatchOutcome {
        let outcome = self.dispatcher.publish(&mut record);
        self.pool.release(record);
        outcome
    }
}

/// Caller facing handle on a pooled record.
///
/// The finalizing methods (`log`, `debug`, `info`, `warn`, `error`, `fatal`) consume the
/// entry, the record can't be touched once it has been handed to the dispatcher. Dropping
/// an entry without logging returns the record to the pool.
pub struct Entry<'a> {
    pipeline: &'a Pipeline,
    record: Option<PooledRecord>,
}

impl Entry<'_> {
    pub fn record(&self) -> Option<&Record> {
        self.record.as_deref()
    }

    fn update(mut self, f: impl FnOnce(&mut Record)) -> Self {
        if let Some(record) = self.record.as_deref_mut() {
            f(record);
        }
        self
    }

    #[must_use]
    pub fn with_field(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.update(|r| {
            r.with_field(key, value);
        })
    }

    #[must_use]
    pub fn with_fields<I, F>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.update(|r| {
            r.with_fields(fields);
        })
    }

    #[must_use]
    pub fn with_error(self, err: impl fmt::Display) -> Self {
        self.update(|r| {
            r.with_error(err);
        })
    }

    #[must_use]
    pub fn with_context(self, context: LogContext) -> Self {
        self.update(|r| {
            r.with_context(context);
        })
    }

    #[must_use]
    pub fn with_time(self, time: DateTime<Utc>) -> Self {
        self.update(|r| {
            r.with_time(time);
        })
    }

    #[must_use]
    pub fn with_caller(self, caller: &'static Location<'static>) -> Self {
        self.update(|r| {
            r.with_caller(caller);
        })
    }

    #[track_caller]
    pub fn log(mut self, level: Level, message: &str) -> DispatchOutcome {
        let caller = Location::caller();
        let Some(mut record) = self.record.take() else {
            return DispatchOutcome::GatedOut;
        };
        let pipeline = self.pipeline;
        if !pipeline.dispatcher.is_enabled(level) {
            pipeline.pool.release(record);
            return DispatchOutcome::GatedOut;
        }
        record.with_level(level).with_message(message);
        if pipeline.config.add_source && record.caller().is_none() {
            record.with_caller(caller);
        }
        pipeline.publish(record)
    }

    #[track_caller]
    pub fn debug(self, message: &str) -> DispatchOutcome {
        self.log(Level::Debug, message)
    }

    #[track_caller]
    pub fn info(self, message: &str) -> DispatchOutcome {
        self.log(Level::Info, message)
    }

    #[track_caller]
    pub fn warn(self, message: &str) -> DispatchOutcome {
        self.log(Level::Warn, message)
    }

    #[track_caller]
    pub fn error(self, err: impl fmt::Display, message: &str) -> DispatchOutcome {
        self.with_error(err).log(Level::Error, message)
    }

    /// Logs at the fatal level, the process is left running
    #[track_caller]
    pub fn fatal(self, err: impl fmt::Display, message: &str) -> DispatchOutcome {
        self.with_error(err).log(Level::Fatal, message)
    }
}

impl Drop for Entry<'_> {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            self.pipeline.pool.release(record);
        }
    }
}
