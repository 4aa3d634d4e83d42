//! Relay configuration file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_FETCH_TIMEOUT, MIN_CLEANUP_INTERVAL};
use crate::engine::{Pipeline, StepError};
use crate::error::{RelayError, RelayResult};
use crate::modules::ModuleInvocation;
use crate::sink::write_private;

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cleanup_interval() -> String {
    DEFAULT_CLEANUP_INTERVAL.to_string()
}

fn default_fetch_timeout() -> String {
    DEFAULT_FETCH_TIMEOUT.to_string()
}

fn default_notify_interval() -> String {
    "1h".to_string()
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The whole configuration: server settings, profiles and notifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, Profile>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notifiers: BTreeMap<String, Notifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public base URL the relay is reachable at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Defaults to the directory holding the configuration file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            url: None,
            storage_path: None,
            log_level: default_log_level(),
            cleanup_interval: default_cleanup_interval(),
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

impl ServerConfig {
    /// The cleanup interval, never below one second.
    pub fn cleanup_interval(&self) -> RelayResult<Duration> {
        let interval = parse_interval("cleanup_interval", &self.cleanup_interval)?;
        Ok(interval.max(MIN_CLEANUP_INTERVAL))
    }

    pub fn fetch_timeout(&self) -> RelayResult<Duration> {
        parse_interval("fetch_timeout", &self.fetch_timeout)
    }
}

fn parse_interval(key: &str, value: &str) -> RelayResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| RelayError::Config(format!("server.{key} '{value}': {e}")))
}

/// A calendar the relay serves: a source plus the modules applied to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// URL or local path of the base calendar; empty for none
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub public: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub immutable_past: bool,

    #[serde(default)]
    pub admin_tokens: Vec<String>,

    #[serde(default)]
    pub modules: Vec<ModuleInvocation>,
}

impl Profile {
    pub fn pipeline(&self) -> RelayResult<Pipeline> {
        Pipeline::from_invocations(&self.modules)
    }

    pub fn validate(&self) -> Result<Pipeline, Vec<StepError>> {
        Pipeline::validate(&self.modules)
    }
}

/// Watches a profile and mails changes to its recipients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notifier {
    pub source: String,

    #[serde(default = "default_notify_interval")]
    pub interval: String,

    #[serde(default)]
    pub recipients: Vec<String>,
}

impl RelayConfig {
    /// `~/.config/icalrelay/config.toml` or the platform equivalent.
    pub fn default_path() -> RelayResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RelayError::Config("Could not determine config directory".into()))?
            .join("icalrelay");

        Ok(config_dir.join("config.toml"))
    }

    /// Load a configuration file. The format follows the file extension.
    pub fn load(path: &Path) -> RelayResult<Self> {
        if !path.exists() {
            return Err(RelayError::NotFound(format!(
                "configuration file {}",
                path.display()
            )));
        }

        let mut config: RelayConfig = Config::builder()
            .add_source(File::from(path))
            .build()
            .map_err(|e| RelayError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        if config.server.storage_path.is_none() {
            config.server.storage_path = path.parent().map(Path::to_path_buf);
        }

        Ok(config)
    }

    /// Write the configuration as TOML, readable by the owner only.
    pub fn save(&self, path: &Path) -> RelayResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| RelayError::Config(e.to_string()))?;

        write_private(path, &content).map_err(|e| {
            RelayError::PersistenceFailure(format!("Could not write {}: {}", path.display(), e))
        })
    }

    /// Names of the profiles marked public, in name order.
    pub fn public_profiles(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .filter(|(_, p)| p.public)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn profile(&self, name: &str) -> RelayResult<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| RelayError::NotFound(format!("profile '{name}'")))
    }

    fn profile_mut(&mut self, name: &str) -> RelayResult<&mut Profile> {
        self.profiles
            .get_mut(name)
            .ok_or_else(|| RelayError::NotFound(format!("profile '{name}'")))
    }

    fn notifier_mut(&mut self, name: &str) -> RelayResult<&mut Notifier> {
        self.notifiers
            .get_mut(name)
            .ok_or_else(|| RelayError::NotFound(format!("notifier '{name}'")))
    }

    pub fn profile_exists(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn notifier_exists(&self, name: &str) -> bool {
        self.notifiers.contains_key(name)
    }

    /// Append a module to a profile's pipeline.
    pub fn add_module(&mut self, profile: &str, module: ModuleInvocation) -> RelayResult<()> {
        self.profile_mut(profile)?.modules.push(module);
        Ok(())
    }

    pub fn remove_module(&mut self, profile: &str, index: usize) -> RelayResult<ModuleInvocation> {
        let modules = &mut self.profile_mut(profile)?.modules;
        if index >= modules.len() {
            return Err(RelayError::NotFound(format!(
                "module {index} of profile '{profile}'"
            )));
        }
        Ok(modules.remove(index))
    }

    /// Create a notifier watching `profile` through the public URL.
    pub fn add_notifier_from_profile(&mut self, profile: &str) -> RelayResult<()> {
        if !self.profile_exists(profile) {
            return Err(RelayError::NotFound(format!("profile '{profile}'")));
        }

        let base = self.server.url.as_deref().unwrap_or_default();
        self.notifiers.insert(
            profile.to_string(),
            Notifier {
                source: format!("{}/profiles/{}", base.trim_end_matches('/'), profile),
                interval: default_notify_interval(),
                recipients: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn add_notify_recipient(&mut self, notifier: &str, recipient: &str) -> RelayResult<()> {
        self.notifier_mut(notifier)?
            .recipients
            .push(recipient.to_string());
        Ok(())
    }

    pub fn remove_notify_recipient(&mut self, notifier: &str, recipient: &str) -> RelayResult<()> {
        let recipients = &mut self.notifier_mut(notifier)?.recipients;
        let position = recipients
            .iter()
            .position(|r| r == recipient)
            .ok_or_else(|| RelayError::NotFound(format!("recipient '{recipient}'")))?;

        recipients.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
url = "https://relay.example.com/"
cleanup_interval = "0s"

[profiles.work]
source = "https://example.com/work.ics"
public = true
admin_tokens = ["secret"]

[[profiles.work.modules]]
name = "delete-bysummary-regex"
regex = "^Lunch"

[[profiles.work.modules]]
name = "delete-byid"
id = "abc"
expires = "2025-01-01T00:00:00Z"

[profiles.private]
source = ""

[notifiers.work]
source = "https://relay.example.com/profiles/work"
recipients = ["a@example.com"]
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_sample() {
        let (dir, path) = write_sample();
        let config = RelayConfig::load(&path).unwrap();

        assert_eq!(config.server.storage_path.as_deref(), Some(dir.path()));
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.public_profiles(), vec!["work"]);

        let work = config.profile("work").unwrap();
        assert_eq!(work.modules.len(), 2);
        assert_eq!(work.modules[1].name, "delete-byid");
        assert_eq!(work.modules[1].expires.as_deref(), Some("2025-01-01T00:00:00Z"));
        assert_eq!(work.modules[1].params.get("id").map(String::as_str), Some("abc"));
        assert!(!work.modules[1].params.contains_key("name"));
        assert!(work.pipeline().is_ok());

        assert_eq!(config.notifiers["work"].interval, "1h");
    }

    #[test]
    fn test_cleanup_interval_has_a_floor() {
        let (_dir, path) = write_sample();
        let config = RelayConfig::load(&path).unwrap();

        assert_eq!(config.server.cleanup_interval().unwrap(), Duration::from_secs(1));
        assert_eq!(config.server.fetch_timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        assert!(matches!(
            RelayConfig::load(Path::new("/nonexistent/config.toml")),
            Err(RelayError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let (_dir, path) = write_sample();
        let mut config = RelayConfig::load(&path).unwrap();

        config
            .add_module(
                "private",
                ModuleInvocation::new("delete-duplicates"),
            )
            .unwrap();
        config.save(&path).unwrap();

        let reloaded = RelayConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_unknown_targets_are_not_found() {
        let mut config = RelayConfig::default();

        assert!(matches!(
            config.add_module("nope", ModuleInvocation::new("delete-duplicates")),
            Err(RelayError::NotFound(_))
        ));
        assert!(matches!(
            config.add_notify_recipient("nope", "a@example.com"),
            Err(RelayError::NotFound(_))
        ));
        assert!(config.profile("nope").is_err());
    }

    #[test]
    fn test_notifier_management() {
        let (_dir, path) = write_sample();
        let mut config = RelayConfig::load(&path).unwrap();

        config.add_notifier_from_profile("private").unwrap();
        assert_eq!(
            config.notifiers["private"].source,
            "https://relay.example.com/profiles/private"
        );

        config.add_notify_recipient("private", "b@example.com").unwrap();
        config.remove_notify_recipient("private", "b@example.com").unwrap();
        assert!(config.notifiers["private"].recipients.is_empty());
        assert!(matches!(
            config.remove_notify_recipient("private", "b@example.com"),
            Err(RelayError::NotFound(_))
        ));
    }
}
