/// Splits a line into delimiter-separated words.
///
/// The cursor is explicit: each parse owns its own `Tokenizer`, so nothing about
/// the parse position outlives the line being parsed.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Tokenizer<'a> {
	pub fn new(line: &'a [u8]) -> Tokenizer<'a> {
		let mut tokenizer = Tokenizer { line, i: 0 };
		tokenizer.skip_delimiters();
		tokenizer
	}

	pub fn is_delimiter(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x07)
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(&c) = self.line.get(self.i) {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	fn skip_delimiters(&mut self) {
		self.proceed_while(Tokenizer::is_delimiter);
	}

	/// The unconsumed rest of the line.
	pub fn rest(&self) -> &'a [u8] {
		&self.line[self.i ..]
	}
}

impl<'a> Iterator for Tokenizer<'a> {
	type Item = &'a [u8];

	fn next(&mut self) -> Option<&'a [u8]> {
		let orig = self.i;
		self.proceed_while(|c| !Tokenizer::is_delimiter(c));
		if orig == self.i {
			return None;
		}
		let word = &self.line[orig .. self.i];
		self.skip_delimiters();
		Some(word)
	}
}
