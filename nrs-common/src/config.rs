//! Configuration loading
//!
//! Bootstrap configuration comes from a single TOML file. Every table is
//! optional; missing values fall back to built-in defaults.
//!
//! # Config file priority
//!
//! 1. Explicit path (caller supplied)
//! 2. `NRS_CONFIG` environment variable
//! 3. `<config dir>/nrs/config.toml`
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "NRS_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reference resolution settings
    #[serde(default)]
    pub enrich: EnrichConfig,

    /// Token files for gated sources
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Reference list normalization rules
    #[serde(default)]
    pub canonicalize: CanonicalizeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// What to do when an adapter fails on a malformed upstream payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Propagate the failure and stop the run
    Abort,
    /// Log the failure, treat it as "no data" and keep going
    #[default]
    Isolate,
}

/// How reference expansion iterates over adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionStrategy {
    /// One scan per adapter; references found later are not revisited
    SinglePass,
    /// Repeat passes until no new references appear (bounded by `max_passes`)
    #[default]
    FixedPoint,
}

/// Reference resolution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichConfig {
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    #[serde(default)]
    pub expansion: ExpansionStrategy,

    /// Upper bound on expansion passes in fixed-point mode
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Provenance tag written onto generated references
    #[serde(default)]
    pub generated_by: Option<String>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::default(),
            expansion: ExpansionStrategy::default(),
            max_passes: default_max_passes(),
            generated_by: None,
        }
    }
}

/// Token files for gated sources, keyed by source name
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(flatten)]
    pub token_files: BTreeMap<String, PathBuf>,
}

/// One low-value reference pattern
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DropRuleConfig {
    /// Source name prefix the rule applies to
    pub source: String,
    /// Regular expression matched against the reference URL
    pub pattern: String,
}

/// Reference list normalization rules
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CanonicalizeConfig {
    /// Rewrite `http://` references to `https://`
    #[serde(default = "default_true")]
    pub upgrade_scheme: bool,

    /// Host alias → canonical host
    #[serde(default = "default_host_aliases")]
    pub host_aliases: BTreeMap<String, String>,

    #[serde(default = "default_drop_rules")]
    pub drop_rules: Vec<DropRuleConfig>,
}

impl Default for CanonicalizeConfig {
    fn default() -> Self {
        Self {
            upgrade_scheme: true,
            host_aliases: default_host_aliases(),
            drop_rules: default_drop_rules(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_passes() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_host_aliases() -> BTreeMap<String, String> {
    ["music.youtube.com", "m.youtube.com", "youtube.com"]
        .into_iter()
        .map(|alias| (alias.to_string(), "www.youtube.com".to_string()))
        .collect()
}

fn default_drop_rules() -> Vec<DropRuleConfig> {
    vec![
        DropRuleConfig {
            source: "spotify".to_string(),
            pattern: "^spotify:".to_string(),
        },
        DropRuleConfig {
            source: "youtube".to_string(),
            pattern: "^vnd\\.youtube:".to_string(),
        },
    ]
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration following the file priority order.
    ///
    /// An explicit path that does not exist is an error; a missing
    /// default file silently yields built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => locate_config_file(),
        };

        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                Self::parse(&content)
            }
            None => {
                debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.enrich.max_passes == 0 {
            return Err(Error::Config("enrich.max_passes must be at least 1".to_string()));
        }
        if let Some(rule) = self.canonicalize.drop_rules.iter().find(|r| r.source.is_empty()) {
            return Err(Error::Config(format!(
                "drop rule with pattern '{}' has an empty source",
                rule.pattern
            )));
        }
        Ok(())
    }
}

/// Find the config file from the environment or the platform config dir
fn locate_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        debug!("{} points at missing file {}", CONFIG_ENV_VAR, path.display());
    }

    dirs::config_dir()
        .map(|dir| dir.join("nrs").join("config.toml"))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.enrich.error_policy, ErrorPolicy::Isolate);
        assert_eq!(config.enrich.expansion, ExpansionStrategy::FixedPoint);
        assert_eq!(config.enrich.max_passes, 8);
        assert!(config.canonicalize.upgrade_scheme);
        assert_eq!(
            config.canonicalize.host_aliases.get("music.youtube.com").map(String::as_str),
            Some("www.youtube.com")
        );
        assert_eq!(config.canonicalize.drop_rules.len(), 2);
    }

    #[test]
    fn test_enrich_table_overrides() {
        let config = TomlConfig::parse(
            r#"
            [enrich]
            error_policy = "abort"
            expansion = "single_pass"
            max_passes = 3
            generated_by = "nightly"
            "#,
        )
        .unwrap();
        assert_eq!(config.enrich.error_policy, ErrorPolicy::Abort);
        assert_eq!(config.enrich.expansion, ExpansionStrategy::SinglePass);
        assert_eq!(config.enrich.max_passes, 3);
        assert_eq!(config.enrich.generated_by.as_deref(), Some("nightly"));
    }

    #[test]
    fn test_zero_max_passes_rejected() {
        let result = TomlConfig::parse("[enrich]\nmax_passes = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_credentials_table_is_flattened() {
        let config = TomlConfig::parse(
            r#"
            [credentials]
            spotify = "spotify_credentials.json"
            google = "/etc/nrs/google.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.credentials.token_files.len(), 2);
        assert_eq!(
            config.credentials.token_files.get("spotify"),
            Some(&PathBuf::from("spotify_credentials.json"))
        );
    }

    #[test]
    fn test_invalid_policy_is_parse_error() {
        let result = TomlConfig::parse("[enrich]\nerror_policy = \"retry\"\n");
        assert!(matches!(result, Err(Error::Toml(_))));
    }
}
