//! TOML configuration (`legis.toml`). Every section and field is optional.

use crate::classify::Classifier;
use crate::error::{Error, Result};
use crate::merge::MergePolicy;
use crate::schema::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "legis.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub merge: MergePolicy,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("legis.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
    /// Per-source overrides keyed by source name (`gov`, `rcl`, `sejm`).
    #[serde(default)]
    pub delays_ms: BTreeMap<String, u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_delay_ms(),
            delays_ms: BTreeMap::new(),
        }
    }
}

fn default_delay_ms() -> u64 {
    1000
}

impl SyncConfig {
    pub fn delay_for(&self, source: SourceKind) -> Duration {
        let ms = self
            .delays_ms
            .get(source.as_str())
            .copied()
            .unwrap_or(self.default_delay_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub rules_path: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// An explicit path must exist; the implicit default may be missing.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    warn!(path = DEFAULT_CONFIG_FILE, "No config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<()> {
        for name in self.sync.delays_ms.keys() {
            if name.parse::<SourceKind>().is_err() {
                return Err(Error::Config(format!("unknown source in sync.delays_ms: {name}")));
            }
        }
        let mut seen = Vec::new();
        for source in &self.merge.precedence {
            if seen.contains(source) {
                return Err(Error::Config(format!("{source} listed twice in merge.precedence")));
            }
            seen.push(*source);
        }
        Ok(())
    }

    pub fn classifier(&self) -> Result<Classifier> {
        match &self.classifier.rules_path {
            Some(path) => Classifier::load_from_file(path),
            None => Ok(Classifier::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database.path, PathBuf::from("legis.db"));
        assert!(config.merge.precedence.is_empty());
        assert_eq!(config.sync.delay_for(SourceKind::Gov), Duration::from_millis(1000));
    }

    #[test]
    fn full_file_parses() {
        let config = Config::from_toml_str(
            r#"
            [database]
            path = "/var/lib/legis/store.db"

            [merge]
            precedence = ["sejm", "rcl", "gov"]

            [sync]
            default_delay_ms = 250
            [sync.delays_ms]
            sejm = 50

            [classifier]
            rules_path = "rules.yaml"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.merge.precedence,
            vec![SourceKind::Sejm, SourceKind::Rcl, SourceKind::Gov]
        );
        assert_eq!(config.sync.delay_for(SourceKind::Sejm), Duration::from_millis(50));
        assert_eq!(config.sync.delay_for(SourceKind::Rcl), Duration::from_millis(250));
        assert_eq!(config.classifier.rules_path, Some(PathBuf::from("rules.yaml")));
    }

    #[test]
    fn unknown_delay_source_is_rejected() {
        let err = Config::from_toml_str("[sync.delays_ms]\nsenat = 10\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn duplicate_precedence_is_rejected() {
        let err = Config::from_toml_str("[merge]\nprecedence = [\"gov\", \"gov\"]\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_or_default(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
