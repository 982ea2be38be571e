use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/advisory-ingest.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// JSON-lines advisory store.
    pub store_path: String,
    pub notifications: NotificationConfig,
    pub short_description: ShortDescriptionConfig,
    pub alias: AliasConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub sendmail_path: String,
    pub from: String,
    /// Receives "Advisory insert failed" notices.
    pub failure_recipient: String,
    /// Receives "Automatically Inserted Advisory" reports.
    pub report_recipient: String,
    /// Named in the failure notice so the reader knows which handler ran.
    pub script_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShortDescriptionConfig {
    pub max_chars: usize,
    pub truncation_suffix: String,
    pub fallback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AliasConfig {
    pub suffix_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: "/var/lib/advisory-ingest/advisories.jsonl".to_string(),
            notifications: NotificationConfig::default(),
            short_description: ShortDescriptionConfig::default(),
            alias: AliasConfig::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            enabled: false,
            sendmail_path: "/usr/sbin/sendmail".to_string(),
            from: "advisories@localhost".to_string(),
            failure_recipient: "root@localhost".to_string(),
            report_recipient: "root@localhost".to_string(),
            script_name: "advisory-ingest".to_string(),
        }
    }
}

impl Default for ShortDescriptionConfig {
    fn default() -> Self {
        ShortDescriptionConfig {
            max_chars: 400,
            truncation_suffix: " [More...]".to_string(),
            fallback: "Security update".to_string(),
        }
    }
}

impl Default for AliasConfig {
    fn default() -> Self {
        AliasConfig { suffix_length: 12 }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {path}"))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file {path}"))?;
        Ok(())
    }

    /// Missing file means defaults; a present but broken file is an error.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            log::warn!("Configuration file {} not found, using defaults", path);
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.short_description.max_chars, 400);
        assert_eq!(config.short_description.truncation_suffix, " [More...]");
        assert_eq!(config.short_description.fallback, "Security update");
        assert_eq!(config.alias.suffix_length, 12);
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("advisory-ingest.yaml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.store_path = "/tmp/store.jsonl".to_string();
        config.notifications.enabled = true;
        config.to_file(path).unwrap();

        assert_eq!(Config::from_file(path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.yaml");
        std::fs::write(&path, "store_path: /srv/a.jsonl\nalias:\n  suffix_length: 8\n").unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.store_path, "/srv/a.jsonl");
        assert_eq!(config.alias.suffix_length, 8);
        assert_eq!(config.short_description.max_chars, 400);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/advisory-ingest.yaml").unwrap();
        assert_eq!(config, Config::default());
    }
}
