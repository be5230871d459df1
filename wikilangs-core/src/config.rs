//! Configuration for artifact resolution and loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WikilangsError};

/// Default hub endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Organization owning one model repository per language.
pub const DEFAULT_ORGANIZATION: &str = "wikilangs";

/// Runtime configuration.
///
/// Values are resolved in order:
/// 1. built-in defaults
/// 2. an optional TOML file (`Config::from_file`)
/// 3. environment variables (`Config::from_env` / `Config::apply_env`)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
	/// Root of the local artifact cache.
	pub cache_dir: PathBuf,
	/// Hub base URL, without trailing slash.
	pub endpoint: String,
	/// Hub organization; language `xx` lives in `{organization}/xx`.
	pub organization: String,
	/// Optional bearer token for the hub.
	pub token: Option<String>,
	/// Per-request timeout, in seconds.
	pub timeout_secs: u64,
	/// Never touch the network; only artifacts already in `cache_dir` resolve.
	pub offline: bool,
	/// Persist parsed tables as postcard snapshots next to the artifacts.
	pub snapshots: bool,
	/// Vocabulary size of the tokenizer used to segment text for subword n-gram models.
	pub companion_vocab_size: u32,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			cache_dir: default_cache_dir(&|key| std::env::var(key).ok()),
			endpoint: DEFAULT_ENDPOINT.to_owned(),
			organization: DEFAULT_ORGANIZATION.to_owned(),
			token: None,
			timeout_secs: 30,
			offline: false,
			snapshots: true,
			companion_vocab_size: 16000,
		}
	}
}

impl Config {
	/// Defaults overridden by the process environment.
	pub fn from_env() -> Result<Self> {
		let mut config = Self::default();
		config.apply_env(|key| std::env::var(key).ok())?;
		Ok(config)
	}

	/// Loads a TOML file; missing keys keep their default.
	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| {
			WikilangsError::Config(format!("Failed to read config file {}: {}", path.display(), e))
		})?;

		let config: Config = toml::from_str(&content)
			.map_err(|e| WikilangsError::Config(format!("Failed to parse config file: {}", e)))?;

		config.validate()?;
		Ok(config)
	}

	/// Applies environment overrides read through `lookup`.
	///
	/// Recognized keys: `WIKILANGS_CACHE`, `HF_ENDPOINT`, `HF_TOKEN`,
	/// `WIKILANGS_ORGANIZATION`, `WIKILANGS_TIMEOUT_SECS`, `WIKILANGS_OFFLINE`,
	/// `HF_HUB_OFFLINE`, `WIKILANGS_SNAPSHOTS`, `WIKILANGS_COMPANION_VOCAB`.
	pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(dir) = lookup("WIKILANGS_CACHE") {
			self.cache_dir = PathBuf::from(dir);
		}
		if let Some(endpoint) = lookup("HF_ENDPOINT") {
			self.endpoint = endpoint.trim_end_matches('/').to_owned();
		}
		if let Some(token) = lookup("HF_TOKEN").filter(|t| !t.trim().is_empty()) {
			self.token = Some(token);
		}
		if let Some(organization) = lookup("WIKILANGS_ORGANIZATION") {
			self.organization = organization;
		}
		if let Some(timeout) = lookup("WIKILANGS_TIMEOUT_SECS") {
			self.timeout_secs = timeout.parse().map_err(|_| {
				WikilangsError::Config(format!("WIKILANGS_TIMEOUT_SECS must be an integer, got '{timeout}'"))
			})?;
		}
		if let Some(offline) = lookup("WIKILANGS_OFFLINE").or_else(|| lookup("HF_HUB_OFFLINE")) {
			self.offline = parse_flag("WIKILANGS_OFFLINE", &offline)?;
		}
		if let Some(snapshots) = lookup("WIKILANGS_SNAPSHOTS") {
			self.snapshots = parse_flag("WIKILANGS_SNAPSHOTS", &snapshots)?;
		}
		if let Some(size) = lookup("WIKILANGS_COMPANION_VOCAB") {
			self.companion_vocab_size = size.parse().map_err(|_| {
				WikilangsError::Config(format!("WIKILANGS_COMPANION_VOCAB must be an integer, got '{size}'"))
			})?;
		}
		self.validate()
	}

	/// Validate configuration values.
	pub fn validate(&self) -> Result<()> {
		if self.cache_dir.as_os_str().is_empty() {
			return Err(WikilangsError::Config("cache_dir must not be empty".into()));
		}
		if !self.offline && !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
			return Err(WikilangsError::Config(format!(
				"endpoint must be an http(s) URL, got '{}'",
				self.endpoint
			)));
		}
		if self.organization.trim().is_empty() || self.organization.contains('/') {
			return Err(WikilangsError::Config(format!(
				"organization must be a single path segment, got '{}'",
				self.organization
			)));
		}
		if self.timeout_secs == 0 {
			return Err(WikilangsError::Config("timeout_secs must be greater than 0".into()));
		}
		Ok(())
	}
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" | "" => Ok(false),
		other => Err(WikilangsError::Config(format!("{key} must be a boolean, got '{other}'"))),
	}
}

/// `$XDG_CACHE_HOME/wikilangs`, else `$HOME/.cache/wikilangs`, else `./.wikilangs-cache`.
fn default_cache_dir(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
	if let Some(xdg) = lookup("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
		return PathBuf::from(xdg).join("wikilangs");
	}
	if let Some(home) = lookup("HOME").filter(|v| !v.is_empty()) {
		return PathBuf::from(home).join(".cache").join("wikilangs");
	}
	PathBuf::from(".wikilangs-cache")
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |key| map.get(key).cloned()
	}

	#[test]
	fn test_default_is_valid() {
		let config = Config::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
		assert_eq!(config.organization, "wikilangs");
		assert!(config.snapshots);
		assert!(!config.offline);
	}

	#[test]
	fn test_env_overrides() {
		let mut config = Config::default();
		config
			.apply_env(env(&[
				("WIKILANGS_CACHE", "/tmp/wl"),
				("HF_ENDPOINT", "http://localhost:8080/"),
				("HF_TOKEN", "hf_abc"),
				("HF_HUB_OFFLINE", "1"),
				("WIKILANGS_TIMEOUT_SECS", "5"),
				("WIKILANGS_COMPANION_VOCAB", "8000"),
			]))
			.unwrap();

		assert_eq!(config.cache_dir, PathBuf::from("/tmp/wl"));
		assert_eq!(config.endpoint, "http://localhost:8080");
		assert_eq!(config.token.as_deref(), Some("hf_abc"));
		assert!(config.offline);
		assert_eq!(config.timeout_secs, 5);
		assert_eq!(config.companion_vocab_size, 8000);
	}

	#[test]
	fn test_env_rejects_bad_values() {
		let mut config = Config::default();
		assert!(config.apply_env(env(&[("WIKILANGS_TIMEOUT_SECS", "soon")])).is_err());

		let mut config = Config::default();
		assert!(config.apply_env(env(&[("WIKILANGS_OFFLINE", "maybe")])).is_err());
	}

	#[test]
	fn test_default_cache_dir_prefers_xdg() {
		let dir = default_cache_dir(&env(&[("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/u")]));
		assert_eq!(dir, PathBuf::from("/xdg/wikilangs"));

		let dir = default_cache_dir(&env(&[("HOME", "/home/u")]));
		assert_eq!(dir, PathBuf::from("/home/u/.cache/wikilangs"));
	}

	#[test]
	fn test_from_file_keeps_defaults_for_missing_keys() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("wikilangs.toml");
		std::fs::write(&path, "cache_dir = \"/var/cache/wikilangs\"\noffline = true\n").unwrap();

		let config = Config::from_file(&path).unwrap();
		assert_eq!(config.cache_dir, PathBuf::from("/var/cache/wikilangs"));
		assert!(config.offline);
		assert_eq!(config.timeout_secs, 30);
	}

	#[test]
	fn test_validate_rejects_nested_organization() {
		let config = Config { organization: "a/b".into(), ..Config::default() };
		assert!(config.validate().is_err());
	}
}
