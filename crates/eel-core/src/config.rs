//! Runtime configuration, loadable from TOML.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```toml
//! [ram]
//! pages = 512
//! page_size = 65536
//! memory_limit_bytes = 0   # 0 = unlimited
//!
//! [strings]
//! max_string_len = 16384
//! mutable_literals = false
//!
//! [matcher]
//! max_steps = 1000000
//! max_depth = 1024
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    MATCH_MAX_DEPTH, MATCH_MAX_STEPS, MAX_STRING_LEN, MAX_USER_STRINGS, RAM_MIN_PAGE_SIZE, RAM_PAGE_SIZE,
    RAM_PAGES, STRING_LITERAL_BASE, STRING_NAMED_BASE, STRING_UNNAMED_BASE,
};
use crate::error::{ConfigError, Result};
use crate::matcher::MatchLimits;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub ram: RamConfig,
    pub strings: StringConfig,
    pub matcher: MatcherConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamConfig {
    /// Page-count cap of each table.
    pub pages: usize,
    /// Cells per page. Power of two, at least 4096.
    pub page_size: usize,
    /// Soft cap on page storage shared by every table using one budget.
    pub memory_limit_bytes: usize,
}

impl Default for RamConfig {
    fn default() -> Self {
        Self {
            pages: RAM_PAGES,
            page_size: RAM_PAGE_SIZE,
            memory_limit_bytes: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringConfig {
    pub max_user_strings: usize,
    pub literal_base: usize,
    pub named_base: usize,
    pub unnamed_base: usize,
    pub max_string_len: usize,
    pub mutable_literals: bool,
}

impl Default for StringConfig {
    fn default() -> Self {
        Self {
            max_user_strings: MAX_USER_STRINGS,
            literal_base: STRING_LITERAL_BASE,
            named_base: STRING_NAMED_BASE,
            unnamed_base: STRING_UNNAMED_BASE,
            max_string_len: MAX_STRING_LEN,
            mutable_literals: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Recursion steps allowed per `match` call; 0 disables the bound.
    pub max_steps: u64,
    /// Nesting bound per call; must be non-zero.
    pub max_depth: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_steps: MATCH_MAX_STEPS,
            max_depth: MATCH_MAX_DEPTH,
        }
    }
}

impl MatcherConfig {
    pub fn limits(&self) -> MatchLimits {
        MatchLimits {
            max_steps: self.max_steps,
            max_depth: self.max_depth,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let ram = &self.ram;
        if !ram.page_size.is_power_of_two() || ram.page_size < RAM_MIN_PAGE_SIZE {
            return Err(ConfigError::InvalidData(format!(
                "ram.page_size must be a power of two >= {RAM_MIN_PAGE_SIZE}, got {}",
                ram.page_size
            )));
        }
        if ram.pages == 0 {
            return Err(ConfigError::InvalidData("ram.pages must be non-zero".into()));
        }
        if ram.pages.checked_mul(ram.page_size).is_none() {
            return Err(ConfigError::InvalidData(
                "ram.pages * ram.page_size overflows".into(),
            ));
        }

        let s = &self.strings;
        if !(s.max_user_strings <= s.literal_base
            && s.literal_base < s.named_base
            && s.named_base < s.unnamed_base)
        {
            return Err(ConfigError::InvalidData(format!(
                "string ranges overlap: user=[0,{}) literal=[{},{}) named=[{},{}) unnamed=[{},..)",
                s.max_user_strings,
                s.literal_base,
                s.named_base,
                s.named_base,
                s.unnamed_base,
                s.unnamed_base
            )));
        }
        if self.matcher.max_depth == 0 {
            return Err(ConfigError::InvalidData("matcher.max_depth must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = RuntimeConfig::from_toml_str(
            "[ram]\npages = 8\n\n[strings]\nmutable_literals = true\n",
        )
        .unwrap();
        assert_eq!(config.ram.pages, 8);
        assert_eq!(config.ram.page_size, RAM_PAGE_SIZE);
        assert!(config.strings.mutable_literals);
        assert_eq!(config.matcher.max_steps, MATCH_MAX_STEPS);
    }

    #[test]
    fn test_rejects_odd_page_size() {
        let err = RuntimeConfig::from_toml_str("[ram]\npage_size = 5000\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidData(_)), "got {err}");
    }

    #[test]
    fn test_rejects_overlapping_string_ranges() {
        let err = RuntimeConfig::from_toml_str("[strings]\nnamed_base = 5000\n").unwrap_err();
        assert!(err.to_string().contains("overlap"), "got {err}");
    }

    #[test]
    fn test_matcher_limits() {
        let config = RuntimeConfig::from_toml_str("[matcher]\nmax_depth = 64\n").unwrap();
        let limits = config.matcher.limits();
        assert_eq!(limits.max_depth, 64);
        assert_eq!(limits.max_steps, MATCH_MAX_STEPS);
        assert!(RuntimeConfig::from_toml_str("[matcher]\nmax_depth = 0\n").is_err());
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = RuntimeConfig::from_toml_str("[ram\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
