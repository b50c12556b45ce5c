//! Severity levels
use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Severity of a record.
///
/// `Unset` sorts below every real level and doubles as the key of the catch-all hooks
/// in the hook registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
#[repr(u8)]
pub enum Level {
    #[default]
    Unset = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

static LEVEL_NAMES: [&str; 6] = ["UNSET", "DEBUG", "INFO", "WARN", "ERROR", "FATAL"];

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];

    pub fn as_str(self) -> &'static str {
        LEVEL_NAMES[self as usize]
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            5 => Level::Fatal,
            _ => Level::Unset,
        }
    }

    /// the catch-all level is not a severity
    pub fn is_catch_all(self) -> bool {
        self == Level::Unset
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(level: &str) -> Result<Self, Self::Err> {
        match level.trim().to_ascii_lowercase().as_str() {
            "unset" | "all" => Ok(Level::Unset),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(Error::UnknownLevel(level.to_owned())),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_owned()
    }
}
