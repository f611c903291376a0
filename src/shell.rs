use std::io::{BufRead, Write};

use crate::config::Config;
use crate::error::{ParseError, ShellError};
use crate::eval::{self, EvalResult, ForkLauncher, Launcher};
use crate::open::{FileOpener, SysOpener};
use crate::parser;
use crate::readline::{Line, LineReader};
use crate::tokenizer::Tokenizer;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status { Continue, Exit }

pub struct Shell<L = ForkLauncher, O = SysOpener> {
	config: Config,
	launcher: L,
	opener: O,
}

impl Shell {
	pub fn new(config: Config) -> Shell {
		Shell::with(config, ForkLauncher, SysOpener)
	}
}

impl<L: Launcher, O: FileOpener> Shell<L, O> {
	pub fn with(config: Config, launcher: L, opener: O) -> Shell<L, O> {
		Shell { config, launcher, opener }
	}

	pub fn launcher(&self) -> &L {
		&self.launcher
	}

	/// Parses and runs one line. Only fatal resource errors escape; everything
	/// else is reported to `stderr` and the shell carries on. Reports are
	/// best effort: a failing `stderr` never ends the line.
	pub fn execute_line(&mut self, line: &[u8], stderr: &mut dyn Write) -> Result<Status, ShellError> {
		if Tokenizer::new(line).next().is_none() {
			return Ok(Status::Continue);
		}
		let pipeline = match parser::parse(line, &mut self.opener, self.config.limits(), stderr) {
			Ok(pipeline) => pipeline,
			Err(e) => {
				let _ = writeln!(stderr, "cshell: {}", e);
				return Ok(Status::Continue);
			},
		};
		match eval::eval(pipeline, &mut self.launcher, stderr)? {
			EvalResult::Exit => Ok(Status::Exit),
			EvalResult::Done(job) => {
				if job.is_empty() {
					tracing::debug!("nothing was spawned");
				} else {
					tracing::debug!(processes = job.len(), status = ?job.code(), "pipeline finished");
				}
				Ok(Status::Continue)
			},
		}
	}

	/// The read-prompt-execute loop. Returns once the terminator command or
	/// the end of input is seen.
	pub fn run<R: BufRead>(&mut self, input: R, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<(), ShellError> {
		let mut reader = LineReader::new(input, self.config.max_line);
		loop {
			stdout.write_all(self.config.prompt.as_bytes())?;
			stdout.flush()?;
			match reader.read_line()? {
				Line::Eof => {
					writeln!(stdout, "exit")?;
					stdout.flush()?;
					return Ok(());
				},
				Line::TooLong => {
					let _ = writeln!(stderr, "cshell: {}", ParseError::LineTooLong);
				},
				Line::Text(line) => {
					if self.execute_line(&line, stderr)? == Status::Exit {
						return Ok(());
					}
				},
			}
		}
	}
}
