//! Framework configuration.
//!
//! Read from `folio.toml` in a configuration directory. Every field has a
//! default, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};

use folio_registry::naming::{DEFAULT_COMMAND_PREFIX, DEFAULT_DOCUMENT_EVENT_PREFIX};
use serde::Deserialize;
use thiserror::Error;

/// File name looked up by [`load_config_from_dir`].
pub const CONFIG_FILE: &str = "folio.toml";

/// Default undo stack capacity.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config: {0}")]
	Read(#[from] std::io::Error),
	#[error("failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameworkConfig {
	pub undo: UndoConfig,
	pub invocation: InvocationConfig,
	pub naming: NamingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UndoConfig {
	/// Undo stack capacity; `0` means unbounded.
	pub limit: usize,
}

impl Default for UndoConfig {
	fn default() -> Self {
		Self {
			limit: DEFAULT_UNDO_LIMIT,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvocationConfig {
	/// Unresolved parameters fail command invocation instead of yielding null.
	pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
	pub command_prefix: String,
	pub document_event_prefix: String,
}

impl Default for NamingConfig {
	fn default() -> Self {
		Self {
			command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
			document_event_prefix: DEFAULT_DOCUMENT_EVENT_PREFIX.to_string(),
		}
	}
}

impl FrameworkConfig {
	pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(content)?)
	}
}

/// Result of loading the configuration directory.
#[derive(Debug, Default)]
pub struct ConfigLoadReport {
	/// Parsed config if the file exists and is valid.
	pub config: Option<FrameworkConfig>,
	/// Read or parse errors keyed by source file path.
	pub errors: Vec<(PathBuf, ConfigError)>,
}

impl ConfigLoadReport {
	/// The loaded config, or defaults.
	pub fn config_or_default(&self) -> FrameworkConfig {
		self.config.clone().unwrap_or_default()
	}
}

/// Loads [`CONFIG_FILE`] from `config_dir`.
pub fn load_config_from_dir(config_dir: &Path) -> ConfigLoadReport {
	let mut report = ConfigLoadReport::default();
	let path = config_dir.join(CONFIG_FILE);
	if !path.exists() {
		return report;
	}

	let loaded = std::fs::read_to_string(&path)
		.map_err(ConfigError::from)
		.and_then(|content| FrameworkConfig::from_toml(&content));
	match loaded {
		Ok(config) => report.config = Some(config),
		Err(error) => {
			tracing::warn!(path = %path.display(), %error, "ignoring invalid config");
			report.errors.push((path, error));
		}
	}
	report
}
