//! A small interactive shell: pipelines of external programs joined by `|`,
//! with `<` and `>` redirection and `exit` as the only builtin.

pub mod builtin;
pub mod config;
pub mod error;
pub mod eval;
pub mod job;
pub mod open;
pub mod parser;
pub mod readline;
pub mod shell;
pub mod tokenizer;
pub mod types;

pub use config::Config;
pub use shell::{Shell, Status};
