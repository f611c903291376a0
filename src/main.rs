use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cshell::{Config, Shell};

#[derive(Debug, Parser)]
#[command(name = "cshell", version, about = "A minimal pipeline shell")]
struct Args {
	/// Run a single command line and exit
	#[arg(short = 'c', value_name = "LINE")]
	command: Option<String>,

	/// Configuration file (default: ~/.config/cshell/config.toml)
	#[arg(long, value_name = "PATH")]
	config: Option<PathBuf>,
}

fn main() -> ExitCode {
	// silent unless CSHELL_LOG is set
	let filter = EnvFilter::try_from_env("CSHELL_LOG").unwrap_or_else(|_| EnvFilter::new("off"));
	tracing_subscriber::registry()
		.with(fmt::layer().with_writer(io::stderr))
		.with(filter)
		.init();

	let args = Args::parse();
	let config = match Config::load(args.config.as_deref()) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("cshell: {}", e);
			return ExitCode::FAILURE;
		},
	};

	let mut shell = Shell::new(config);
	let mut stderr = io::stderr();
	let r = match args.command {
		Some(line) => shell.execute_line(line.as_bytes(), &mut stderr).map(|_| ()),
		None => {
			let stdin = io::stdin();
			shell.run(stdin.lock(), &mut io::stdout(), &mut stderr)
		},
	};
	match r {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "fatal");
			eprintln!("cshell: {}", e);
			ExitCode::FAILURE
		},
	}
}
