use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::bridge::MONITOR_PATH;
use crate::error::{Error, Result};

/// Runtime settings. Missing fields in `config.json` take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the mail server, e.g. `http://localhost:9000`.
    pub server_url: String,
    pub monitor_path: String,
    /// Mailbox opened at startup. Empty means none.
    pub default_mailbox: String,
    pub monitor_on_start: bool,
    pub search_delay_ms: u64,
    pub resize_delay_ms: u64,
    pub newest_first: bool,
    pub desktop_notifications: bool,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: "http://localhost:9000".into(),
            monitor_path: MONITOR_PATH.into(),
            default_mailbox: String::new(),
            monitor_on_start: false,
            search_delay_ms: 250,
            resize_delay_ms: 500,
            newest_first: true,
            desktop_notifications: true,
            request_timeout_secs: 30,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bucketwatch")
}

fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

fn layout_path() -> PathBuf {
    config_dir().join("layout.json")
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&config_path())
    }

    fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        let cfg: Config = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))?;
        Ok(Some(cfg))
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("create config dir: {e}")))?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("serialize config: {e}")))?;
        fs::write(path, data).map_err(|e| Error::Config(format!("write config: {e}")))
    }

    /// Change a preference in the config file. Environment overrides of the
    /// running config are not written back. A file that fails to parse is
    /// left alone.
    pub fn persist(edit: impl FnOnce(&mut Config)) -> Result<()> {
        Self::persist_at(&config_path(), edit)
    }

    fn persist_at(path: &Path, edit: impl FnOnce(&mut Config)) -> Result<()> {
        let mut stored = Self::load_from(path)?.unwrap_or_default();
        edit(&mut stored);
        stored.save_to(path)
    }

    /// Overlay `BUCKETWATCH_*` variables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay `BUCKETWATCH_*` variables read through `lookup`. Unparseable
    /// values are logged and skipped.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("BUCKETWATCH_URL") {
            self.server_url = url;
        }
        if let Some(mailbox) = lookup("BUCKETWATCH_MAILBOX") {
            self.default_mailbox = mailbox.trim().to_string();
        }
        if let Some(v) = lookup("BUCKETWATCH_MONITOR") {
            match parse_flag(&v) {
                Some(on) => self.monitor_on_start = on,
                None => log::warn!("Ignoring BUCKETWATCH_MONITOR={:?}", v),
            }
        }
        if let Some(v) = lookup("BUCKETWATCH_NOTIFY") {
            match parse_flag(&v) {
                Some(on) => self.desktop_notifications = on,
                None => log::warn!("Ignoring BUCKETWATCH_NOTIFY={:?}", v),
            }
        }
        if let Some(v) = lookup("BUCKETWATCH_SEARCH_DELAY_MS") {
            match v.trim().parse() {
                Ok(ms) => self.search_delay_ms = ms,
                Err(_) => log::warn!("Ignoring BUCKETWATCH_SEARCH_DELAY_MS={:?}", v),
            }
        }
    }

    /// Resolution order: defaults → config file → env vars.
    /// A broken config file is logged and skipped.
    pub fn resolve() -> Self {
        let mut config = match Self::load() {
            Ok(Some(cfg)) => {
                log::info!("Config loaded from {}", config_path().display());
                cfg
            }
            Ok(None) => {
                log::info!("No config file found, using defaults");
                Config::default()
            }
            Err(e) => {
                log::warn!("Config file error: {}", e);
                Config::default()
            }
        };
        config.apply_env();
        config
    }

    pub fn server(&self) -> Result<Url> {
        let url = Url::parse(self.server_url.trim())?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::Config(format!(
                "server_url must be http or https, got {other:?}"
            ))),
        }
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }

    pub fn resize_delay(&self) -> Duration {
        Duration::from_millis(self.resize_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_mailbox(&self) -> Option<&str> {
        Some(self.default_mailbox.as_str()).filter(|m| !m.is_empty())
    }
}

/// Pane split ratios, persisted between runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub sidebar_ratio: f32,
    pub list_ratio: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            sidebar_ratio: 0.20,
            list_ratio: 0.40,
        }
    }
}

impl LayoutConfig {
    /// Saved layout, or the default when missing or unreadable.
    pub fn load() -> Self {
        let path = layout_path();
        let Ok(data) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<LayoutConfig>(&data) {
            Ok(layout) => layout.clamped(),
            Err(e) => {
                log::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        let path = layout_path();
        let result = fs::create_dir_all(config_dir())
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string(self).map_err(|e| e.to_string()))
            .and_then(|data| fs::write(&path, data).map_err(|e| e.to_string()));
        match result {
            Ok(()) => log::debug!("Layout saved: {:?}", self),
            Err(e) => log::warn!("Failed to save layout: {}", e),
        }
    }

    fn clamped(self) -> Self {
        LayoutConfig {
            sidebar_ratio: self.sidebar_ratio.clamp(0.05, 0.95),
            list_ratio: self.list_ratio.clamp(0.05, 0.95),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.server().unwrap().as_str(), "http://localhost:9000/");
        assert_eq!(cfg.monitor_path, "/api/v1/monitor/messages");
        assert_eq!(cfg.search_delay(), Duration::from_millis(250));
        assert_eq!(cfg.resize_delay(), Duration::from_millis(500));
        assert!(cfg.newest_first);
        assert_eq!(cfg.default_mailbox(), None);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"server_url":"https://mail.test","default_mailbox":"swaks"}"#)
                .unwrap();
        assert_eq!(cfg.server_url, "https://mail.test");
        assert_eq!(cfg.default_mailbox(), Some("swaks"));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = Config::default();
        cfg.apply_env_with(env(&[
            ("BUCKETWATCH_URL", "http://inbucket:9000"),
            ("BUCKETWATCH_MAILBOX", " swaks "),
            ("BUCKETWATCH_MONITOR", "1"),
            ("BUCKETWATCH_NOTIFY", "off"),
            ("BUCKETWATCH_SEARCH_DELAY_MS", "100"),
        ]));
        assert_eq!(cfg.server_url, "http://inbucket:9000");
        assert_eq!(cfg.default_mailbox(), Some("swaks"));
        assert!(cfg.monitor_on_start);
        assert!(!cfg.desktop_notifications);
        assert_eq!(cfg.search_delay_ms, 100);
    }

    #[test]
    fn bad_env_values_are_skipped() {
        let mut cfg = Config::default();
        cfg.apply_env_with(env(&[
            ("BUCKETWATCH_MONITOR", "maybe"),
            ("BUCKETWATCH_SEARCH_DELAY_MS", "soon"),
        ]));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn server_must_be_http() {
        let cfg = Config {
            server_url: "ftp://example.com".into(),
            ..Config::default()
        };
        assert!(matches!(cfg.server(), Err(Error::Config(_))));

        let cfg = Config {
            server_url: "not a url".into(),
            ..Config::default()
        };
        assert!(matches!(cfg.server(), Err(Error::Address(_))));
    }

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("bucketwatch-{}-{name}", std::process::id()))
            .join("config.json")
    }

    #[test]
    fn persist_edits_file_without_env_overrides() {
        let path = scratch_file("persist");
        let _ = fs::remove_file(&path);

        Config::persist_at(&path, |c| c.newest_first = false).unwrap();
        let stored = Config::load_from(&path).unwrap().unwrap();
        assert!(!stored.newest_first);
        assert_eq!(stored.server_url, Config::default().server_url);

        fs::write(&path, r#"{"server_url":"http://file:9000","default_mailbox":"swaks"}"#)
            .unwrap();
        Config::persist_at(&path, |c| c.newest_first = false).unwrap();
        let stored = Config::load_from(&path).unwrap().unwrap();
        assert_eq!(stored.server_url, "http://file:9000");
        assert_eq!(stored.default_mailbox(), Some("swaks"));
        assert!(!stored.newest_first);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn persist_leaves_broken_file_alone() {
        let path = scratch_file("broken");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = Config::persist_at(&path, |c| c.newest_first = false);
        assert!(matches!(err, Err(Error::Config(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn layout_ratios_clamped() {
        let layout: LayoutConfig =
            serde_json::from_str(r#"{"sidebar_ratio": 1.5, "list_ratio": 0.3}"#).unwrap();
        let layout = layout.clamped();
        assert_eq!(layout.sidebar_ratio, 0.95);
        assert_eq!(layout.list_ratio, 0.3);
    }
}
