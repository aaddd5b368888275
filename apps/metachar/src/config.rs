//! # Configuration
//!
//! Optional `metachar.toml` settings, overridden by command-line flags.
//!
//! ```toml
//! sheet = "characters/aria.txt"
//! log_format = "json"
//! template = "dnd5e"
//! ```

use metachar_core::{MetaCharError, Sheet, template};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "metachar.toml";

/// Sheet file used when neither the flag nor the config names one.
pub const DEFAULT_SHEET_FILE: &str = "character.txt";

/// Environment variable selecting the log format; wins over the config.
pub const LOG_FORMAT_ENV: &str = "METACHAR_LOG_FORMAT";

// =============================================================================
// VALUE TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = MetaCharError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(MetaCharError::CorruptField {
                field: "log_format".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Starting point for `metachar new`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateChoice {
    /// The built-in D&D 5e layout.
    #[default]
    Dnd5e,
    /// One empty page.
    Empty,
}

impl TemplateChoice {
    pub fn build(self) -> Result<Sheet, MetaCharError> {
        match self {
            Self::Dnd5e => template::dnd5e(),
            Self::Empty => Ok(Sheet::new()),
        }
    }
}

impl FromStr for TemplateChoice {
    type Err = MetaCharError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dnd5e" => Ok(Self::Dnd5e),
            "empty" => Ok(Self::Empty),
            other => Err(MetaCharError::CorruptField {
                field: "template".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TemplateChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dnd5e => "dnd5e",
            Self::Empty => "empty",
        })
    }
}

// =============================================================================
// CONFIG FILE
// =============================================================================

/// Contents of a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sheet: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
    pub template: Option<TemplateChoice>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, MetaCharError> {
        Self::parse(content, Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Parse config text; errors name `origin`.
    fn parse(content: &str, origin: &Path) -> Result<Self, MetaCharError> {
        toml::from_str(content).map_err(|e| MetaCharError::CorruptField {
            field: origin.display().to_string(),
            value: e.to_string().trim_end().to_string(),
        })
    }

    /// Load the config file.
    ///
    /// An explicit path must exist. Without one, `metachar.toml` in the
    /// working directory is used if present, and defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MetaCharError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            MetaCharError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&content, &path)
    }

    /// The log format: environment first, then this file, then text.
    pub fn log_format(&self, env: Option<&str>) -> LogFormat {
        env.and_then(|value| value.parse().ok())
            .or(self.log_format)
            .unwrap_or_default()
    }

    /// The sheet path: flag first, then this file, then the default.
    pub fn sheet_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.sheet.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHEET_FILE))
    }

    /// The template: flag first, then this file, then D&D 5e.
    pub fn template(&self, flag: Option<TemplateChoice>) -> TemplateChoice {
        flag.or(self.template).unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================
