use std::io;
use std::io::BufRead;

#[derive(Debug, PartialEq, Eq)]
pub enum Line {
	/// One line without its terminating newline.
	Text(Vec<u8>),
	/// The line reached the length bound; the rest of it was discarded.
	TooLong,
	Eof,
}

/// Reads bounded lines from a buffered source. At most `max_line` bytes of a
/// line are ever held; the rest of an overlong line is skipped unread.
pub struct LineReader<R> {
	inner: R,
	max_line: usize,
	buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
	pub fn new(inner: R, max_line: usize) -> LineReader<R> {
		LineReader { inner, max_line, buf: Vec::with_capacity(max_line) }
	}

	pub fn read_line(&mut self) -> io::Result<Line> {
		self.buf.clear();
		let mut seen = false;
		let mut too_long = false;
		loop {
			let (used, done) = {
				let available = match self.inner.fill_buf() {
					Ok(available) => available,
					Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
					Err(e) => return Err(e),
				};
				if available.is_empty() {
					break;
				}
				seen = true;
				let (chunk, used, done) = match available.iter().position(|&c| c == b'\n') {
					Some(i) => (&available[.. i], i + 1, true),
					None => (available, available.len(), false),
				};
				if !too_long {
					if self.buf.len() + chunk.len() >= self.max_line {
						too_long = true;
						self.buf.clear();
					} else {
						self.buf.extend_from_slice(chunk);
					}
				}
				(used, done)
			};
			self.inner.consume(used);
			if done {
				break;
			}
		}

		if !seen {
			Ok(Line::Eof)
		} else if too_long {
			Ok(Line::TooLong)
		} else {
			Ok(Line::Text(self.buf.clone()))
		}
	}
}
