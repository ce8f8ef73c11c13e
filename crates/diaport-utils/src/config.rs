//! # Configuration
//!
//! Process settings read from environment variables.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `RUST_LOG` | log filter directives | `info` |
//! | `DIAPORT_LOG_FORMAT` | `pretty` or `json` | `pretty` |
//! | `DIAPORT_LOG_FILE` | also write logs to this file | none |
//! | `DIAPORT_SYMBOL_PATH` | `;`-separated store search path | `_NT_SYMBOL_PATH` |
//! | `DIAPORT_MAX_FRAMES` | stack walk frame limit | 256 |
//!
//! Command-line flags override these by assigning the public fields.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::logging::LogFormat;

pub const LOG_FILTER_VAR: &str = "RUST_LOG";
pub const LOG_FORMAT_VAR: &str = "DIAPORT_LOG_FORMAT";
pub const LOG_FILE_VAR: &str = "DIAPORT_LOG_FILE";
pub const SYMBOL_PATH_VAR: &str = "DIAPORT_SYMBOL_PATH";
/// Search path variable honoured by other debugging tools.
pub const NT_SYMBOL_PATH_VAR: &str = "_NT_SYMBOL_PATH";
pub const MAX_FRAMES_VAR: &str = "DIAPORT_MAX_FRAMES";

pub const DEFAULT_LOG_FILTER: &str = "info";
pub const DEFAULT_MAX_FRAMES: usize = 256;

/// Resolved process settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings
{
    pub log_filter: String,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    pub symbol_path: Option<String>,
    pub max_frames: usize,
}

impl Default for Settings
{
    fn default() -> Self
    {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::Pretty,
            log_file: None,
            symbol_path: None,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl Settings
{
    /// Read settings from the process environment.
    ///
    /// ## Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set.
    ///
    /// Empty values count as unset.
    ///
    /// ```rust
    /// use diaport_utils::Settings;
    ///
    /// let settings = Settings::from_lookup(|name| match name {
    ///     "_NT_SYMBOL_PATH" => Some("C:\\symbols".to_string()),
    ///     "DIAPORT_MAX_FRAMES" => Some("32".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(settings.symbol_path.as_deref(), Some("C:\\symbols"));
    /// assert_eq!(settings.max_frames, 32);
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError>
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(filter) = get(LOG_FILTER_VAR) {
            settings.log_filter = filter;
        }
        if let Some(format) = get(LOG_FORMAT_VAR) {
            settings.log_format = LogFormat::from_str(&format).map_err(ConfigError::InvalidLogFormat)?;
        }
        settings.log_file = get(LOG_FILE_VAR).map(PathBuf::from);
        settings.symbol_path = get(SYMBOL_PATH_VAR).or_else(|| get(NT_SYMBOL_PATH_VAR));
        if let Some(raw) = get(MAX_FRAMES_VAR) {
            settings.max_frames = match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        variable: MAX_FRAMES_VAR,
                        value: raw,
                    });
                }
            };
        }
        Ok(settings)
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError
{
    #[error("{0}")]
    InvalidLogFormat(String),

    #[error("{variable} must be a positive integer, got {value:?}")]
    InvalidNumber
    {
        variable: &'static str,
        value: String,
    },
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError>
    {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults()
    {
        assert_eq!(settings(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn test_own_symbol_path_wins()
    {
        let resolved = settings(&[(SYMBOL_PATH_VAR, "/mine"), (NT_SYMBOL_PATH_VAR, "/theirs")]).unwrap();
        assert_eq!(resolved.symbol_path.as_deref(), Some("/mine"));

        let fallback = settings(&[(SYMBOL_PATH_VAR, " "), (NT_SYMBOL_PATH_VAR, "/theirs")]).unwrap();
        assert_eq!(fallback.symbol_path.as_deref(), Some("/theirs"));
    }

    #[test]
    fn test_invalid_values()
    {
        assert!(matches!(
            settings(&[(MAX_FRAMES_VAR, "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            settings(&[(MAX_FRAMES_VAR, "many")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            settings(&[(LOG_FORMAT_VAR, "xml")]),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_log_settings()
    {
        let resolved = settings(&[
            (LOG_FILTER_VAR, "diaport_core=trace"),
            (LOG_FORMAT_VAR, "json"),
            (LOG_FILE_VAR, "/tmp/diaport.log"),
        ])
        .unwrap();
        assert_eq!(resolved.log_filter, "diaport_core=trace");
        assert_eq!(resolved.log_format, LogFormat::Json);
        assert_eq!(resolved.log_file, Some(PathBuf::from("/tmp/diaport.log")));
    }
}
