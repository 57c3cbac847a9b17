//! # Manager Configuration
//!
//! Arena geometry and allocator policy, loaded once at startup from TOML.
//!
//! ```toml
//! page_count = 4
//! page_size = 4096
//! auto_compact = true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{MemoryError, MemoryResult};

/// Default number of pages.
pub const DEFAULT_PAGE_COUNT: usize = 1;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Configuration for a [`MemoryManager`](crate::MemoryManager).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Number of pages in the arena.
    pub page_count: usize,
    /// Size of one page in bytes.
    pub page_size: usize,
    /// Compact the arena and retry when an allocation finds no free block.
    pub auto_compact: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            page_count: DEFAULT_PAGE_COUNT,
            page_size: DEFAULT_PAGE_SIZE,
            auto_compact: true,
        }
    }
}

impl ManagerConfig {
    /// Parses a configuration from TOML text. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the text is not valid TOML
    /// for this structure.
    pub fn from_toml_str(text: &str) -> MemoryResult<Self> {
        toml::from_str(text).map_err(|e| MemoryError::InvalidConfig(e.to_string()))
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Total arena size, or `None` if `page_count * page_size` overflows.
    #[inline]
    #[must_use]
    pub const fn total_bytes(&self) -> Option<usize> {
        self.page_count.checked_mul(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.total_bytes(), Some(4096));
        assert!(config.auto_compact);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ManagerConfig::from_toml_str("page_size = 1000\nauto_compact = false\n").unwrap();
        assert_eq!(config.page_count, 1);
        assert_eq!(config.page_size, 1000);
        assert!(!config.auto_compact);
    }

    #[test]
    fn test_parse_errors() {
        let result = ManagerConfig::from_toml_str("page_count = \"many\"");
        assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));

        let result = ManagerConfig::from_toml_file("/nonexistent/vmem.toml");
        assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
    }

    #[test]
    fn test_total_bytes_overflow() {
        let config = ManagerConfig {
            page_count: usize::MAX,
            page_size: 2,
            auto_compact: true,
        };
        assert_eq!(config.total_bytes(), None);
    }
}
