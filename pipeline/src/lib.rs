//! Pipeline crate
//!
//! Structured log events, from the caller to the hooks.
//!
//! Callers fill a pooled [`record::Record`] through an [`pipeline::Entry`], the
//! [`dispatch::Dispatcher`] gates it on the minimum level, renders it with the configured
//! [`encoder::Encoder`] and fans the bytes out to the hooks registered under the
//! catch-all level and under the record's own level. The record then goes back to the
//! [`pool::RecordPool`].
//!
//! There is no global state: everything hangs off a [`pipeline::Pipeline`] that is
//! constructed explicitly and shared behind an `Arc`.
//!
//! # Examples
//! ```
//! use batchlog_pipeline::prelude::*;
//! use std::sync::Arc;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
//! pipeline.register_hook(Level::Unset, Arc::new(NullHook {}));
//!
//! pipeline
//!     .entry()
//!     .with_field("user_id", 42)
//!     .info("user logged in");
//! ```
//!

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod dispatch;
pub mod encoder;
pub mod errors;
pub mod fields;
pub mod hook;
pub mod levels;
pub mod pipeline;
pub mod pool;
pub mod record;

pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::encoder::{Encoder, EncoderKind};
    pub use crate::fields::{DefaultKey, Field, LogContext, Value};
    pub use crate::hook::{Hook, NullHook};
    pub use crate::levels::*;
    pub use crate::pipeline::{Entry, Pipeline};
}
