use std::fmt;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

/// Where one end of a stage's standard streams goes.
#[derive(Debug)]
pub enum Stream {
	/// Inherit from the neighbouring pipe segment, or the shell's own stream at the pipeline edges.
	Inherit,
	/// An explicitly redirected descriptor.
	File(OwnedFd),
}

impl Stream {
	pub fn as_fd(&self) -> Option<BorrowedFd<'_>> {
		match *self {
			Stream::Inherit => None,
			Stream::File(ref fd) => Some(fd.as_fd()),
		}
	}

	pub fn is_inherit(&self) -> bool {
		match *self {
			Stream::Inherit => true,
			Stream::File(_) => false,
		}
	}
}

impl Default for Stream {
	fn default() -> Stream {
		Stream::Inherit
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output }

impl RedirectType {
	pub fn from_token(token: &[u8]) -> Option<RedirectType> {
		match token {
			b"<" => Some(RedirectType::Input),
			b">" => Some(RedirectType::Output),
			_ => None,
		}
	}
}

impl fmt::Display for RedirectType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			RedirectType::Input => f.write_str("input"),
			RedirectType::Output => f.write_str("output"),
		}
	}
}

#[derive(Debug, Default)]
pub struct Command<'a> {
	pub arguments: Vec<&'a [u8]>,
	pub input: Stream,
	pub output: Stream,
	pub continues: bool,
}

impl<'a> Command<'a> {
	pub fn name(&self) -> Option<&'a [u8]> {
		self.arguments.first().copied()
	}
}

#[derive(Debug)]
pub struct Pipeline<'a> {
	pub commands: Vec<Command<'a>>,
}

impl<'a> Pipeline<'a> {
	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}
}
