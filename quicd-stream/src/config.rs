//! Stream engine configuration.
//!
//! Loaded from the `[streams]` table of the server TOML file or built in
//! code. Every field has a default, so an empty table is valid.
//!
//! ```toml
//! initial_max_stream_data_local = 1048576
//! initial_max_stream_data_remote = 1048576
//! window_update_threshold = 0.5
//! max_chain_segments = 256
//! memory_limit = 268435456
//! ```

use crate::error::{Error, Result};
use crate::frame_chain::MAX_STREAM_DATACNT;
use crate::mem::{BoundedPool, SharedPool, SystemPool};
use crate::types::VARINT_MAX;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-connection stream engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Receive window announced on every new stream.
    ///
    /// **Default:** `1048576` (1 MiB)
    pub initial_max_stream_data_local: u64,

    /// Send window assumed for every new stream until the peer's transport
    /// parameters or MAX_STREAM_DATA say otherwise.
    ///
    /// **Default:** `1048576` (1 MiB)
    pub initial_max_stream_data_remote: u64,

    /// Fraction of the initial receive window that must be returned by the
    /// application before a MAX_STREAM_DATA update is worth sending.
    ///
    /// Must be in `(0, 1]`.
    ///
    /// **Default:** `0.5`
    pub window_update_threshold: f64,

    /// Maximum data segments one popped frame chain may reference.
    ///
    /// **Default:** `256`
    pub max_chain_segments: usize,

    /// Hard cap on bytes charged by all streams sharing the pool.
    /// `None` means unbounded.
    ///
    /// **Default:** `None`
    pub memory_limit: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_max_stream_data_local: 1024 * 1024,
            initial_max_stream_data_remote: 1024 * 1024,
            window_update_threshold: 0.5,
            max_chain_segments: MAX_STREAM_DATACNT,
            memory_limit: None,
        }
    }
}

impl StreamConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// - `Error::ConfigParse` on malformed TOML or wrong field types
    /// - `Error::InvalidConfig` with every failed check
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: StreamConfig = toml::from_str(s)?;
        config.validate().map_err(Error::InvalidConfig)?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.initial_max_stream_data_local > VARINT_MAX {
            errors.push(format!(
                "initial_max_stream_data_local ({}) exceeds 2^62 - 1",
                self.initial_max_stream_data_local
            ));
        }

        if self.initial_max_stream_data_remote > VARINT_MAX {
            errors.push(format!(
                "initial_max_stream_data_remote ({}) exceeds 2^62 - 1",
                self.initial_max_stream_data_remote
            ));
        }

        if !(self.window_update_threshold > 0.0 && self.window_update_threshold <= 1.0) {
            errors.push(format!(
                "window_update_threshold ({}) must be in (0, 1]",
                self.window_update_threshold
            ));
        }

        if self.max_chain_segments == 0 || self.max_chain_segments > MAX_STREAM_DATACNT {
            errors.push(format!(
                "max_chain_segments ({}) must be between 1 and {}",
                self.max_chain_segments, MAX_STREAM_DATACNT
            ));
        }

        if self.memory_limit == Some(0) {
            errors.push("memory_limit must be greater than 0".to_string());
        }

        if errors.is_empty() {
            self.warn_suspicious();
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build the pool described by `memory_limit`.
    pub fn memory_pool(&self) -> SharedPool {
        match self.memory_limit {
            Some(limit) => BoundedPool::shared(limit),
            None => SystemPool::shared(),
        }
    }

    // Valid but likely to stall a connection.
    fn warn_suspicious(&self) {
        if self.initial_max_stream_data_local == 0 {
            warn!("initial_max_stream_data_local is 0, peers cannot send until a window update");
        }

        if let Some(limit) = self.memory_limit {
            let window = self.initial_max_stream_data_local as u128;
            if (limit as u128) < window {
                warn!(
                    memory_limit = limit,
                    initial_max_stream_data_local = self.initial_max_stream_data_local,
                    "memory_limit is smaller than one stream's receive window"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemoryPool;

    #[test]
    fn test_default_config_is_valid() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_chain_segments, 256);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = StreamConfig::from_toml_str("").unwrap();
        assert_eq!(config, StreamConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = StreamConfig::from_toml_str(
            r#"
            initial_max_stream_data_local = 65536
            memory_limit = 1000000
            "#,
        )
        .unwrap();
        assert_eq!(config.initial_max_stream_data_local, 65536);
        assert_eq!(config.initial_max_stream_data_remote, 1024 * 1024);
        assert_eq!(config.memory_limit, Some(1_000_000));
    }

    #[test]
    fn test_validation_collects_every_error() {
        let config = StreamConfig {
            window_update_threshold: 0.0,
            max_chain_segments: 300,
            memory_limit: Some(0),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("window_update_threshold"));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = StreamConfig::from_toml_str("window_update_threshold = \"half\"").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));

        let err = StreamConfig::from_toml_str("max_chain_segments = 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref v) if v.len() == 1));
    }

    #[test]
    fn test_memory_pool_respects_limit() {
        let config = StreamConfig {
            memory_limit: Some(64),
            ..Default::default()
        };
        let pool = config.memory_pool();
        assert!(pool.try_reserve(64).is_ok());
        assert!(pool.try_reserve(1).unwrap_err().is_out_of_memory());
        pool.release(64);
    }
}
