use std::fs;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::types::RedirectType;

/// Permission bits for files created by output redirection.
pub const CREATE_MODE: u32 = 0o600;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OpenMode { Read, WriteTruncate }

impl From<RedirectType> for OpenMode {
	fn from(typ: RedirectType) -> OpenMode {
		match typ {
			RedirectType::Input => OpenMode::Read,
			RedirectType::Output => OpenMode::WriteTruncate,
		}
	}
}

/// Materializes redirection targets into descriptors.
pub trait FileOpener {
	fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<OwnedFd>;
}

/// Opens real files. Descriptors are close-on-exec, so a spawned program only
/// keeps the ones duplicated onto its standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysOpener;

impl FileOpener for SysOpener {
	fn open(&mut self, path: &Path, mode: OpenMode) -> io::Result<OwnedFd> {
		let mut oopt = fs::OpenOptions::new();
		let _ = match mode {
			OpenMode::Read => oopt.read(true),
			OpenMode::WriteTruncate => oopt.write(true).create(true).truncate(true).mode(CREATE_MODE),
		};
		let file = oopt.open(path)?;
		Ok(OwnedFd::from(file))
	}
}
