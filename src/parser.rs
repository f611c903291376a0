use std::ffi::OsStr;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::{ParseError, ParseResult, RedirectError};
use crate::open::FileOpener;
use crate::tokenizer::Tokenizer;
use crate::types::*;

pub const PIPE: &[u8] = b"|";

/// Capacity bounds for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
	pub max_args: usize,
	pub max_commands: usize,
}

impl Default for Limits {
	fn default() -> Limits {
		Limits { max_args: 11, max_commands: 20 }
	}
}

struct Parser<'a, 'o, 'e> {
	tokens: Tokenizer<'a>,
	opener: &'o mut dyn FileOpener,
	stderr: &'e mut dyn Write,
	limits: Limits,
}

impl<'a, 'o, 'e> Parser<'a, 'o, 'e> {
	/// Opens a redirection target. A target that cannot be opened is reported
	/// and the stage keeps its default stream.
	fn open_redirect(&mut self, command: &mut Command<'a>, typ: RedirectType, target: &'a [u8]) {
		let path = Path::new(OsStr::from_bytes(target));
		match self.opener.open(path, typ.into()) {
			Ok(fd) => match typ {
				RedirectType::Input => command.input = Stream::File(fd),
				RedirectType::Output => command.output = Stream::File(fd),
			},
			Err(source) => {
				let e = RedirectError { path: path.to_owned(), typ, source };
				tracing::warn!(path = %e.path.display(), error = %e.source, "redirection dropped");
				let _ = writeln!(self.stderr, "cshell: {}", e);
			},
		}
	}

	/// Consumes tokens up to the next pipe separator or the end of the line.
	fn parse_command(&mut self) -> ParseResult<Command<'a>> {
		let mut command = Command::default();
		let mut pending: Option<RedirectType> = None;

		while let Some(token) = self.tokens.next() {
			if token == PIPE {
				command.continues = true;
				break;
			}
			match (pending, RedirectType::from_token(token)) {
				(Some(_), Some(_)) => { return Err(ParseError::Syntax); },
				(Some(typ), None) => {
					self.open_redirect(&mut command, typ, token);
					pending = None;
				},
				(None, Some(typ)) => { pending = Some(typ); },
				(None, None) => {
					if command.arguments.len() >= self.limits.max_args {
						return Err(ParseError::TooManyArguments);
					}
					command.arguments.push(token);
				},
			}
		}

		// an operator must always be followed by its target
		if pending.is_some() {
			return Err(ParseError::Syntax);
		}
		Ok(command)
	}

	fn parse_pipeline(&mut self) -> ParseResult<Pipeline<'a>> {
		let mut commands: Vec<Command<'a>> = vec![];

		loop {
			let command = self.parse_command()?;
			if command.arguments.is_empty() {
				return Err(ParseError::InvalidPipe);
			}
			let continues = command.continues;
			commands.push(command);
			if !continues {
				break;
			}
			if commands.len() >= self.limits.max_commands {
				return Err(ParseError::TooManyCommands);
			}
		}
		Ok(Pipeline { commands })
	}
}

/// Parses a line into a pipeline. Redirection targets are opened while parsing;
/// targets that fail to open are reported to `stderr` without failing the parse.
pub fn parse<'a>(line: &'a [u8], opener: &mut dyn FileOpener, limits: Limits,
                 stderr: &mut dyn Write) -> ParseResult<Pipeline<'a>> {
	let mut parser = Parser { tokens: Tokenizer::new(line), opener, stderr, limits };
	let pipeline = parser.parse_pipeline()?;
	tracing::debug!(stages = pipeline.len(), "parsed pipeline");
	Ok(pipeline)
}
