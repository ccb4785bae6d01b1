//! Engine configuration
//!
//! Limits applied to the script runtime when an [`Engine`](crate::Engine)
//! is created. Unset limits leave the runtime's own defaults in place.

use log::warn;

use crate::error::{Error, Result};

/// Smallest accepted memory limit; a full context does not fit in less
pub const MIN_MEMORY_LIMIT: usize = 1024 * 1024;

/// Environment variable names read by [`EngineConfig::from_env`]
pub const ENV_MEMORY_LIMIT: &str = "JSEASY_MEMORY_LIMIT";
pub const ENV_MAX_STACK_SIZE: &str = "JSEASY_MAX_STACK_SIZE";
pub const ENV_GC_THRESHOLD: &str = "JSEASY_GC_THRESHOLD";

/// Runtime limits, all in bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Heap limit for the runtime
    pub memory_limit: Option<usize>,
    /// Native stack limit for script execution
    pub max_stack_size: Option<usize>,
    /// Allocation volume between garbage collections
    pub gc_threshold: Option<usize>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_max_stack_size(mut self, bytes: usize) -> Self {
        self.max_stack_size = Some(bytes);
        self
    }

    pub fn with_gc_threshold(mut self, bytes: usize) -> Self {
        self.gc_threshold = Some(bytes);
        self
    }

    /// Read limits from `JSEASY_*` environment variables
    ///
    /// Values that do not parse as byte counts are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            let raw = lookup(key)?;
            match raw.trim().parse::<usize>() {
                Ok(bytes) => Some(bytes),
                Err(_) => {
                    warn!("ignoring {}={:?}: not a byte count", key, raw);
                    None
                }
            }
        };
        EngineConfig {
            memory_limit: read(ENV_MEMORY_LIMIT),
            max_stack_size: read(ENV_MAX_STACK_SIZE),
            gc_threshold: read(ENV_GC_THRESHOLD),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.memory_limit {
            Some(limit) if limit < MIN_MEMORY_LIMIT => Err(Error::Config(format!(
                "memory limit {} is below the minimum of {} bytes",
                limit, MIN_MEMORY_LIMIT
            ))),
            _ => Ok(()),
        }
    }
}
