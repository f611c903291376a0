use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::parser::Limits;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub prompt: String,
	/// Lines reaching this many bytes are rejected as too long.
	pub max_line: usize,
	pub max_args: usize,
	pub max_commands: usize,
}

impl Default for Config {
	fn default() -> Config {
		let limits = Limits::default();
		Config {
			prompt: ":-) ".to_string(),
			max_line: 1024,
			max_args: limits.max_args,
			max_commands: limits.max_commands,
		}
	}
}

impl Config {
	pub fn from_toml(path: &Path, content: &str) -> Result<Config, ConfigError> {
		let config: Config = toml::from_str(content)
			.map_err(|source| ConfigError::Toml { path: path.to_owned(), source })?;
		config.validate()?;
		Ok(config)
	}

	pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
		let content = fs::read_to_string(path)
			.map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
		Config::from_toml(path, &content)
	}

	/// `~/.config/cshell/config.toml`
	pub fn default_path() -> Option<PathBuf> {
		let home = env::var_os("HOME")?;
		Some(Path::new(&home).join(".config/cshell/config.toml"))
	}

	/// Loads an explicit file, which must exist and parse. Without one, the
	/// default path is tried and any problem with it falls back to defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
		if let Some(path) = explicit {
			return Config::from_file(path);
		}
		let path = match Config::default_path() {
			Some(path) if path.is_file() => path,
			_ => return Ok(Config::default()),
		};
		match Config::from_file(&path) {
			Ok(config) => Ok(config),
			Err(e) => {
				tracing::warn!(error = %e, "ignoring config file");
				eprintln!("cshell: {}", e);
				Ok(Config::default())
			},
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.max_line == 0 {
			return Err(ConfigError::Invalid("max_line must be positive"));
		}
		if self.max_args == 0 {
			return Err(ConfigError::Invalid("max_args must be positive"));
		}
		if self.max_commands == 0 {
			return Err(ConfigError::Invalid("max_commands must be positive"));
		}
		Ok(())
	}

	pub fn limits(&self) -> Limits {
		Limits { max_args: self.max_args, max_commands: self.max_commands }
	}
}
