#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Builtin {
	/// Terminates the shell with a success status.
	Exit,
}

pub fn match_builtin(name: &[u8]) -> Option<Builtin> {
	match name {
		b"exit" => Some(Builtin::Exit),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_exit_is_reserved() {
		assert_eq!(match_builtin(b"exit"), Some(Builtin::Exit));
		assert_eq!(match_builtin(b"cd"), None);
		assert_eq!(match_builtin(b"Exit"), None);
		assert_eq!(match_builtin(b"exit2"), None);
	}
}
