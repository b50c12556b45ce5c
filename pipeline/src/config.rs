//! Settings consumed by the pipeline and its batching sink
use crate::encoder::EncoderKind;
use crate::errors::{Error, Result};
use crate::fields::{DEFAULT_CUSTOM_PREFIX, DefaultKeys};
use crate::levels::Level;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_FLUSH_RATE: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BATCH: usize = 20;
pub const DEFAULT_POOL_RETAIN: usize = 1024;
/// RFC 822 layout, rendered in UTC
pub const DEFAULT_TIME_FORMAT: &str = "%d %b %y %H:%M %Z";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_level: Level,
    pub encoder: EncoderKind,
    pub add_source: bool,
    pub time_format: String,
    #[serde(rename = "flush_rate_ms", with = "duration_ms")]
    pub flush_rate: Duration,
    pub max_batch: usize,
    pub pool_prewarm: usize,
    pub pool_retain: usize,
    pub custom_prefix: String,
    pub default_keys: DefaultKeys,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_level: Level::Info,
            encoder: EncoderKind::Json,
            add_source: true,
            time_format: DEFAULT_TIME_FORMAT.into(),
            flush_rate: DEFAULT_FLUSH_RATE,
            max_batch: DEFAULT_MAX_BATCH,
            pool_prewarm: 0,
            pool_retain: DEFAULT_POOL_RETAIN,
            custom_prefix: DEFAULT_CUSTOM_PREFIX.into(),
            default_keys: DefaultKeys::default(),
        }
    }
}

fn env_var<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl PipelineConfig {
    /// Defaults overridden by the `BATCHLOG_*` environment variables.
    /// Values that don't parse are ignored.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(level) = env_var::<Level>("BATCHLOG_MIN_LEVEL") {
            self.min_level = level;
        }
        if let Some(encoder) = env_var::<EncoderKind>("BATCHLOG_ENCODER") {
            self.encoder = encoder;
        }
        if let Some(millis) = env_var::<u64>("BATCHLOG_FLUSH_RATE_MS") {
            self.flush_rate = Duration::from_millis(millis);
        }
        if let Some(max_batch) = env_var::<usize>("BATCHLOG_MAX_BATCH") {
            self.max_batch = max_batch;
        }
        if let Some(prewarm) = env_var::<usize>("BATCHLOG_POOL_PREWARM") {
            self.pool_prewarm = prewarm;
        }
        if let Some(add_source) = env_var::<bool>("BATCHLOG_ADD_SOURCE") {
            self.add_source = add_source;
        }
        self.sanitized()
    }

    /// Zero rate or capacity fall back to the defaults
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.flush_rate.is_zero() {
            self.flush_rate = DEFAULT_FLUSH_RATE;
        }
        if self.max_batch == 0 {
            self.max_batch = DEFAULT_MAX_BATCH;
        }
        if self.pool_retain == 0 {
            self.pool_retain = DEFAULT_POOL_RETAIN;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if StrftimeItems::new(&self.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::InvalidTimeFormat(self.time_format.clone()));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
