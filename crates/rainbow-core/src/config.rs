//! Search configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Alphabet, Error, KeySpace, PartitionManager, Result, DEFAULT_BLOCK_SIZE};

pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

pub const DEFAULT_MAX_STRING_LENGTH: u32 = 8;

/// Blocks per work unit
pub const DEFAULT_WORK_SIZE: u32 = 2;

/// Work units kept in flight per worker
pub const DEFAULT_MESSAGES_BUFFERED: usize = 3;

/// Keyspace and scheduling parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Symbols in digit order
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
    #[serde(default = "default_max_string_length")]
    pub max_string_length: u32,
    /// Plaintexts per block
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    /// Blocks per work unit
    #[serde(default = "default_work_size")]
    pub work_size: u32,
    /// Work units kept in flight per worker
    #[serde(default = "default_messages_buffered")]
    pub messages_buffered: usize,
}

fn default_alphabet() -> String {
    DEFAULT_ALPHABET.to_string()
}

fn default_max_string_length() -> u32 {
    DEFAULT_MAX_STRING_LENGTH
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

fn default_work_size() -> u32 {
    DEFAULT_WORK_SIZE
}

fn default_messages_buffered() -> usize {
    DEFAULT_MESSAGES_BUFFERED
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            alphabet: default_alphabet(),
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            block_size: DEFAULT_BLOCK_SIZE,
            work_size: DEFAULT_WORK_SIZE,
            messages_buffered: DEFAULT_MESSAGES_BUFFERED,
        }
    }
}

impl SearchConfig {
    pub fn with_alphabet(mut self, alphabet: impl Into<String>) -> Self {
        self.alphabet = alphabet.into();
        self
    }

    pub fn with_max_string_length(mut self, max_string_length: u32) -> Self {
        self.max_string_length = max_string_length;
        self
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_work_size(mut self, work_size: u32) -> Self {
        self.work_size = work_size;
        self
    }

    pub fn with_messages_buffered(mut self, messages_buffered: usize) -> Self {
        self.messages_buffered = messages_buffered;
        self
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn keyspace(&self) -> Result<KeySpace> {
        let alphabet = Alphabet::new(&self.alphabet)?;
        KeySpace::with_block_size(alphabet, self.block_size)
    }

    /// Check every parameter, including that the largest length's block
    /// count fits in an `i64`
    pub fn validate(&self) -> Result<()> {
        self.partition_manager().map(|_| ())
    }

    /// Fresh allocator for this configuration
    pub fn partition_manager(&self) -> Result<PartitionManager> {
        if self.work_size == 0 {
            return Err(Error::InvalidConfig("work size must be at least 1".to_string()));
        }
        if self.messages_buffered == 0 {
            return Err(Error::InvalidConfig(
                "messages buffered must be at least 1".to_string(),
            ));
        }
        PartitionManager::new(self.keyspace()?, self.max_string_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.alphabet, "abcdefghijklmnopqrstuvwxyz");
        assert_eq!(config.max_string_length, 8);
        assert_eq!(config.block_size, 100_000_000);
        assert_eq!(config.work_size, 2);
        assert_eq!(config.messages_buffered, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"alphabet":"0123456789","block_size":1000}"#).unwrap();
        assert_eq!(config.alphabet, "0123456789");
        assert_eq!(config.block_size, 1000);
        assert_eq!(config.max_string_length, DEFAULT_MAX_STRING_LENGTH);
        assert_eq!(config.work_size, DEFAULT_WORK_SIZE);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("search.json");

        let config = SearchConfig::default()
            .with_alphabet("ab")
            .with_max_string_length(12)
            .with_block_size(64)
            .with_work_size(4)
            .with_messages_buffered(1);
        config.save(&path).unwrap();

        assert_eq!(SearchConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(matches!(
            SearchConfig::default().with_alphabet("").validate(),
            Err(Error::InvalidAlphabet(_))
        ));
        assert!(matches!(
            SearchConfig::default().with_block_size(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            SearchConfig::default().with_work_size(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            SearchConfig::default().with_max_string_length(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            SearchConfig::default()
                .with_alphabet("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789")
                .with_max_string_length(11)
                .validate(),
            Err(Error::Overflow { .. })
        ));
        assert!(matches!(
            SearchConfig::default()
                .with_alphabet("a")
                .with_max_string_length(4_000_000_000)
                .validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(SearchConfig::default()
            .with_alphabet("a")
            .with_max_string_length(64)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_partition_manager_from_config() {
        let pm = SearchConfig::default()
            .with_block_size(100)
            .with_max_string_length(3)
            .partition_manager()
            .unwrap();
        assert_eq!(pm.number_of_blocks(3), Some(176));
        assert_eq!(pm.max_string_length(), 3);
    }
}
