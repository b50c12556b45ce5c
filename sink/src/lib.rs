//! Batching sink library
//!
//! Writes the records of a [`batchlog_pipeline::pipeline::Pipeline`] to a byte stream in
//! batches, and wires the pipeline, the sink and any extra hook together behind a
//! [`PipelineGuard`].

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc, clippy::new_without_default)]

use std::sync::Arc;
use std::time::Duration;

pub mod batching_sink;
pub mod errors;
pub mod forwarding_hook;
pub mod output;
pub mod scheduler;

use batchlog_pipeline::config::PipelineConfig;
use batchlog_pipeline::encoder::EncoderKind;
use batchlog_pipeline::fields::{ContextExtractor, StaticFieldsParser};
use batchlog_pipeline::hook::SharedHook;
use batchlog_pipeline::levels::Level;
use batchlog_pipeline::pipeline::Pipeline;
use batching_sink::{BatchingSink, SINK_NAME, SinkStats};
use output::{SharedOutput, stdout_output};

pub struct PipelineGuardBuilder {
    config: PipelineConfig,
    output: Option<SharedOutput>,
    static_fields: Option<StaticFieldsParser>,
    context_extractor: Option<ContextExtractor>,
    extra_hooks: Vec<(Level, SharedHook)>,
}

impl Default for PipelineGuardBuilder {
    fn default() -> Self {
        Self {
            config: PipelineConfig::from_env(),
            output: None,
            static_fields: None,
            context_extractor: None,
            extra_hooks: vec![],
        }
    }
}

impl PipelineGuardBuilder {
    /// Replaces the whole configuration, environment overrides included
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.config.min_level = level;
        self
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: EncoderKind) -> Self {
        self.config.encoder = encoder;
        self
    }

    #[must_use]
    pub fn with_flush_rate(mut self, flush_rate: Duration) -> Self {
        self.config.flush_rate = flush_rate;
        self
    }

    #[must_use]
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.config.max_batch = max_batch;
        self
    }

    #[must_use]
    pub fn with_pool_prewarm(mut self, prewarm: usize) -> Self {
        self.config.pool_prewarm = prewarm;
        self
    }

    /// Where the batches are written. Defaults to stdout.
    #[must_use]
    pub fn with_output(mut self, output: SharedOutput) -> Self {
        self.output = Some(output);
        self
    }

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

    /// Registers a hook next to the batching sink. A hook with the name of the sink
    /// under [`Level::Unset`] would replace it.
    #[must_use]
    pub fn add_hook(mut self, level: Level, hook: SharedHook) -> Self {
        self.extra_hooks.push((level, hook));
        self
    }

    /// Must be called from within a tokio runtime
    pub fn build(self) -> anyhow::Result<PipelineGuard> {
        let config = self.config.sanitized();
        let mut builder = Pipeline::builder(config.clone());
        if let Some(parser) = self.static_fields {
            builder = builder.with_static_fields(parser);
        }
        if let Some(extractor) = self.context_extractor {
            builder = builder.with_context_extractor(extractor);
        }
        let pipeline = builder.build()?;

        let output = self.output.unwrap_or_else(stdout_output);
        let sink = BatchingSink::from_config(&config, output)?;
        pipeline.register_hook(Level::Unset, sink.clone());
        for (level, hook) in self.extra_hooks {
            pipeline.register_hook(level, hook);
        }
        tracing::debug!(
            min_level = %config.min_level,
            encoder = %config.encoder,
            max_batch = config.max_batch,
            flush_rate_ms = config.flush_rate.as_millis() as u64,
            "pipeline ready"
        );
        Ok(PipelineGuard { pipeline, sink })
    }
}

pub struct PipelineGuard {
    pipeline: Arc<Pipeline>,
    sink: Arc<BatchingSink>,
}

impl PipelineGuard {
    pub fn new() -> anyhow::Result<Self> {
        PipelineGuardBuilder::default().build()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn sink(&self) -> &Arc<BatchingSink> {
        &self.sink
    }

    /// Detaches the sink from the pipeline and drains it. Every record published before
    /// the call is written when this returns.
    pub async fn shutdown(self) -> SinkStats {
        self.pipeline.deregister_hook(Level::Unset, SINK_NAME);
        self.sink.stop().await;
        let stats = self.sink.stats();
        tracing::debug!(
            flushes = stats.flushes,
            blobs_written = stats.blobs_written,
            write_errors = stats.write_errors,
            "pipeline shut down"
        );
        stats
    }
}
