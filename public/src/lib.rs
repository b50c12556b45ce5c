//! batchlog : structured logging, rendered once and written in batches
//!
//! ```no_run
//! use batchlog::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let guard = PipelineGuardBuilder::default()
//!         .with_min_level(Level::Debug)
//!         .build()?;
//!     guard
//!         .pipeline()
//!         .entry()
//!         .with_field("user_id", 42)
//!         .info("user logged in");
//!     guard.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod pipeline {
    pub use batchlog_pipeline::*;
}

pub mod sink {
    pub use batchlog_sink::*;
}

pub mod prelude {
    pub use batchlog_pipeline::prelude::*;
    pub use batchlog_sink::batching_sink::{BatchingSink, SinkStats};
    pub use batchlog_sink::forwarding_hook::ForwardingHook;
    pub use batchlog_sink::output::{SharedOutput, shared_output, stdout_output};
    pub use batchlog_sink::{PipelineGuard, PipelineGuardBuilder};
}
