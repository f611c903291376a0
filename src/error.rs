use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::RedirectType;

/// Errors that reject a whole line before anything is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("Syntax error")]
	Syntax,
	#[error("Invalid pipe")]
	InvalidPipe,
	#[error("Too many arguments")]
	TooManyArguments,
	#[error("Too many commands")]
	TooManyCommands,
	#[error("Command line too long")]
	LineTooLong,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A redirection target that could not be opened. The stage keeps its default stream.
#[derive(Debug, Error)]
#[error("Unable to open file for {typ}")]
pub struct RedirectError {
	pub path: PathBuf,
	pub typ: RedirectType,
	#[source]
	pub source: io::Error,
}

/// Resource failures in the controlling process. These end the shell.
#[derive(Debug, Error)]
pub enum ExecError {
	#[error("pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("wait: {0}")]
	Wait(#[source] nix::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("cannot read {}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("cannot parse {}: {source}", .path.display())]
	Toml {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("invalid setting: {0}")]
	Invalid(&'static str),
}

#[derive(Debug, Error)]
pub enum ShellError {
	#[error(transparent)]
	Exec(#[from] ExecError),
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}
