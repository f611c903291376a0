use std::ffi::{CString, NulError};
use std::io::Write;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::ptr;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::builtin::{self, Builtin};
use crate::error::ExecError;
use crate::job::Job;
use crate::types::Pipeline;

/// A ready-to-exec argument vector. Everything the child needs is allocated
/// before forking, so the child only makes async-signal-safe calls.
#[derive(Debug)]
pub struct Argv {
	args: Vec<CString>,
	ptrs: Vec<*const libc::c_char>,
	not_found: Vec<u8>,
}

impl Argv {
	pub fn new(arguments: &[&[u8]]) -> Result<Argv, NulError> {
		let args: Result<Vec<CString>, NulError> = arguments.iter().map(|&s| CString::new(s)).collect();
		let args = args?;
		let mut ptrs: Vec<*const libc::c_char> = args.iter().map(|s| s.as_ptr()).collect();
		ptrs.push(ptr::null());

		let mut not_found = b"cshell: ".to_vec();
		not_found.extend_from_slice(arguments.first().copied().unwrap_or(b""));
		not_found.extend_from_slice(b": Command not found\n");

		Ok(Argv { args, ptrs, not_found })
	}

	pub fn args(&self) -> &[CString] {
		&self.args
	}
}

/// The process-level primitives the executor drives.
pub trait Launcher {
	/// Creates a pipe segment as (read end, write end).
	fn pipe(&mut self) -> nix::Result<(OwnedFd, OwnedFd)>;
	/// Starts `argv` with its standard streams replaced by `stdin`/`stdout` where given.
	fn launch(&mut self, argv: &Argv, stdin: Option<BorrowedFd<'_>>, stdout: Option<BorrowedFd<'_>>) -> nix::Result<Pid>;
	/// Waits for the next state change of `pid`.
	fn wait(&mut self, pid: Pid) -> nix::Result<WaitStatus>;
}

/// Retries a system call interrupted by a signal.
fn syscall<F, T>(f: F) -> nix::Result<T> where F: Fn() -> nix::Result<T> {
	loop {
		match f() {
			Err(Errno::EINTR) => (),
			result => return result,
		}
	}
}

fn write_stderr(msg: &[u8]) {
	unsafe {
		libc::write(libc::STDERR_FILENO, msg.as_ptr() as *const libc::c_void, msg.len());
	}
}

fn redirect_stream(fd: RawFd, target: RawFd) -> nix::Result<()> {
	if fd == target {
		// dup2 onto itself keeps close-on-exec; clear it instead
		Errno::result(unsafe { libc::fcntl(fd, libc::F_SETFD, 0) })?;
	} else {
		Errno::result(unsafe { libc::dup2(fd, target) })?;
	}
	Ok(())
}

fn exec_command(argv: &Argv, stdin: Option<RawFd>, stdout: Option<RawFd>) -> ! {
	// the Rust runtime ignores SIGPIPE, and ignored signals survive exec
	unsafe { libc::signal(libc::SIGPIPE, libc::SIG_DFL); }
	for &(fd, target) in &[(stdin, libc::STDIN_FILENO), (stdout, libc::STDOUT_FILENO)] {
		if let Some(fd) = fd {
			if redirect_stream(fd, target).is_err() {
				write_stderr(b"cshell: cannot redirect standard stream\n");
				unsafe { libc::_exit(1) }
			}
		}
	}
	unsafe { libc::execvp(argv.ptrs[0], argv.ptrs.as_ptr()); }
	write_stderr(&argv.not_found);
	unsafe { libc::_exit(1) }
}

/// Launches with fork/exec; programs are looked up on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkLauncher;

impl Launcher for ForkLauncher {
	fn pipe(&mut self) -> nix::Result<(OwnedFd, OwnedFd)> {
		unistd::pipe2(OFlag::O_CLOEXEC)
	}

	fn launch(&mut self, argv: &Argv, stdin: Option<BorrowedFd<'_>>, stdout: Option<BorrowedFd<'_>>) -> nix::Result<Pid> {
		let stdin = stdin.map(|fd| fd.as_raw_fd());
		let stdout = stdout.map(|fd| fd.as_raw_fd());
		match unsafe { unistd::fork() }? {
			ForkResult::Parent { child } => Ok(child),
			ForkResult::Child => exec_command(argv, stdin, stdout),
		}
	}

	fn wait(&mut self, pid: Pid) -> nix::Result<WaitStatus> {
		syscall(|| wait::waitpid(pid, Some(WaitPidFlag::WUNTRACED)))
	}
}

#[derive(Debug)]
pub enum EvalResult {
	/// The line asked the shell to terminate; nothing was spawned.
	Exit,
	/// Every spawned process has terminated.
	Done(Job),
}

/// Spawns the stages left to right. Each stage reads from its own input
/// redirection, else the previous segment's read end; it writes to its own
/// output redirection, else a fresh segment's write end when another stage
/// follows. The parent closes each descriptor once the child holding it exists.
fn spawn_commands(pipeline: Pipeline, launcher: &mut dyn Launcher, stderr: &mut dyn Write) -> Result<Job, ExecError> {
	let mut job = Job::new(pipeline.len());
	let mut previous: Option<OwnedFd> = None;

	for command in pipeline.commands {
		let segment = if command.continues {
			Some(launcher.pipe().map_err(ExecError::Pipe)?)
		} else {
			None
		};

		let stdin = command.input.as_fd().or_else(|| previous.as_ref().map(|fd| fd.as_fd()));
		let stdout = command.output.as_fd().or_else(|| segment.as_ref().map(|(_, write)| write.as_fd()));
		let name = String::from_utf8_lossy(command.name().unwrap_or(b"")).into_owned();

		match Argv::new(&command.arguments) {
			Ok(argv) => match launcher.launch(&argv, stdin, stdout) {
				Ok(pid) => {
					tracing::debug!(%pid, %name, "spawned");
					job.push(pid, name);
				},
				Err(e) => {
					tracing::warn!(%name, error = %e, "spawn failed");
					let _ = writeln!(stderr, "cshell: {}", e.desc());
				},
			},
			Err(e) => {
				let _ = writeln!(stderr, "cshell: {}: {}", name, e);
			},
		}

		// the previous read end and this segment's write end belong to the children now
		previous = segment.map(|(read, _)| read);
	}
	Ok(job)
}

/// Runs a parsed pipeline to completion.
pub fn eval(pipeline: Pipeline, launcher: &mut dyn Launcher, stderr: &mut dyn Write) -> Result<EvalResult, ExecError> {
	if pipeline.is_empty() {
		return Ok(EvalResult::Done(Job::default()));
	}
	let first = pipeline.commands.first().and_then(|c| c.name());
	if let Some(Builtin::Exit) = first.and_then(builtin::match_builtin) {
		return Ok(EvalResult::Exit);
	}

	let mut job = spawn_commands(pipeline, launcher, stderr)?;
	job.wait(launcher).map_err(ExecError::Wait)?;
	Ok(EvalResult::Done(job))
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::parser::tests::{parse_with, reader_closed, writer_closed};
	use crate::parser::Limits;
	use std::collections::HashMap;
	use std::fs;

	#[derive(Debug, PartialEq, Eq)]
	pub(crate) struct Launch {
		pub args: Vec<String>,
		pub stdin: Option<RawFd>,
		pub stdout: Option<RawFd>,
		pub spawned: bool,
	}

	/// Creates real non-blocking pipes but never forks; records what would have
	/// been spawned. `inherited` holds duplicates of the streams each spawned
	/// child would own.
	#[derive(Debug, Default)]
	pub(crate) struct RecordingLauncher {
		pub pipes: Vec<(RawFd, RawFd)>,
		pub launches: Vec<Launch>,
		pub inherited: Vec<(Option<fs::File>, Option<fs::File>)>,
		pub statuses: HashMap<Pid, Vec<WaitStatus>>,
		pub waited: Vec<Pid>,
		pub fail_launch: Vec<usize>,
		pub fail_pipe: bool,
	}

	fn dup(fd: Option<BorrowedFd<'_>>) -> Option<fs::File> {
		fd.map(|fd| fs::File::from(fd.try_clone_to_owned().unwrap()))
	}

	impl Launcher for RecordingLauncher {
		fn pipe(&mut self) -> nix::Result<(OwnedFd, OwnedFd)> {
			if self.fail_pipe {
				return Err(Errno::EMFILE);
			}
			let (read, write) = unistd::pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC)?;
			self.pipes.push((read.as_raw_fd(), write.as_raw_fd()));
			Ok((read, write))
		}

		fn launch(&mut self, argv: &Argv, stdin: Option<BorrowedFd<'_>>, stdout: Option<BorrowedFd<'_>>) -> nix::Result<Pid> {
			let idx = self.launches.len();
			let spawned = !self.fail_launch.contains(&idx);
			self.launches.push(Launch {
				args: argv.args().iter().map(|a| a.to_string_lossy().into_owned()).collect(),
				stdin: stdin.map(|fd| fd.as_raw_fd()),
				stdout: stdout.map(|fd| fd.as_raw_fd()),
				spawned,
			});
			if !spawned {
				return Err(Errno::EAGAIN);
			}
			self.inherited.push((dup(stdin), dup(stdout)));
			let pid = Pid::from_raw(1000 + idx as i32);
			self.statuses.entry(pid).or_insert_with(|| vec![WaitStatus::Exited(pid, 0)]);
			Ok(pid)
		}

		fn wait(&mut self, pid: Pid) -> nix::Result<WaitStatus> {
			self.waited.push(pid);
			match self.statuses.get_mut(&pid) {
				Some(queue) if !queue.is_empty() => Ok(queue.remove(0)),
				_ => Err(Errno::ECHILD),
			}
		}
	}

	fn run(line: &str, launcher: &mut RecordingLauncher) -> (Result<EvalResult, ExecError>, String) {
		let (pipeline, _, _) = parse_with(line, Limits::default());
		let mut stderr: Vec<u8> = vec![];
		let r = eval(pipeline.unwrap(), launcher, &mut stderr);
		(r, String::from_utf8(stderr).unwrap())
	}

	fn done(r: Result<EvalResult, ExecError>) -> Job {
		match r.unwrap() {
			EvalResult::Done(job) => job,
			EvalResult::Exit => panic!("unexpected exit"),
		}
	}

	#[test]
	fn single_stage_spawns_one_process_with_parsed_arguments() {
		let mut launcher = RecordingLauncher::default();
		let (r, stderr) = run("ls -l -a /tmp", &mut launcher);
		let job = done(r);

		assert!(launcher.pipes.is_empty());
		assert_eq!(launcher.launches, vec![Launch {
			args: vec!["ls".into(), "-l".into(), "-a".into(), "/tmp".into()],
			stdin: None,
			stdout: None,
			spawned: true,
		}]);
		assert_eq!(job.len(), 1);
		assert_eq!(job.processes[0].name, "ls");
		assert_eq!(launcher.waited, vec![Pid::from_raw(1000)]);
		assert_eq!(stderr, "");
	}

	#[test]
	fn adjacent_stages_share_one_segment() {
		for len in 2 .. 6 {
			let mut launcher = RecordingLauncher::default();
			let line = vec!["cat"; len].join(" | ");
			let job = done(run(&line, &mut launcher).0);

			assert_eq!(launcher.pipes.len(), len - 1);
			assert_eq!(launcher.launches.len(), len);
			assert_eq!(job.len(), len);
			assert_eq!(launcher.launches[0].stdin, None);
			assert_eq!(launcher.launches[len - 1].stdout, None);
			for i in 0 .. len - 1 {
				let (read, write) = launcher.pipes[i];
				assert_eq!(launcher.launches[i].stdout, Some(write));
				assert_eq!(launcher.launches[i + 1].stdin, Some(read));
			}
		}
	}

	#[test]
	fn echo_into_cat_waits_on_both() {
		let mut launcher = RecordingLauncher::default();
		let job = done(run("echo hi | cat", &mut launcher).0);
		assert_eq!(launcher.pipes.len(), 1);
		assert_eq!(launcher.launches[0].args, ["echo", "hi"]);
		assert_eq!(launcher.launches[1].args, ["cat"]);
		assert_eq!(launcher.waited, vec![Pid::from_raw(1000), Pid::from_raw(1001)]);
		assert_eq!(job.state(), crate::job::State::Terminated);
	}

	#[test]
	fn explicit_redirection_overrides_the_pipe() {
		let mut launcher = RecordingLauncher::default();
		let (pipeline, opener, _) = parse_with("a > out | b < in", Limits::default());
		let pipeline = pipeline.unwrap();
		let out = pipeline.commands[0].output.as_fd().map(|fd| fd.as_raw_fd());
		let input = pipeline.commands[1].input.as_fd().map(|fd| fd.as_raw_fd());
		assert!(out.is_some() && input.is_some());

		let mut stderr: Vec<u8> = vec![];
		done(eval(pipeline, &mut launcher, &mut stderr));

		assert_eq!(launcher.pipes.len(), 1);
		assert_eq!(launcher.launches[0].stdout, out);
		assert_eq!(launcher.launches[1].stdin, input);
		assert_ne!(launcher.launches[0].stdout, Some(launcher.pipes[0].1));
		assert_ne!(launcher.launches[1].stdin, Some(launcher.pipes[0].0));

		// only the children's copies keep the files open
		assert!(!opener.is_closed(0));
		assert!(!opener.is_closed(1));
		launcher.inherited.clear();
		assert!(opener.is_closed(0));
		assert!(opener.is_closed(1));
	}

	#[test]
	fn parent_keeps_no_write_end_of_any_segment() {
		let mut launcher = RecordingLauncher::default();
		done(run("a | b | c | d", &mut launcher).0);
		let (stdins, stdouts): (Vec<_>, Vec<_>) = launcher.inherited.drain(..).unzip();
		let stdins: Vec<fs::File> = stdins.into_iter().flatten().collect();
		assert_eq!(stdins.len(), 3);
		for stdin in &stdins {
			assert!(!writer_closed(stdin));
		}
		drop(stdouts);
		for stdin in &stdins {
			assert!(writer_closed(stdin));
		}
	}

	#[test]
	fn parent_keeps_no_read_end_of_any_segment() {
		let mut launcher = RecordingLauncher::default();
		done(run("a | b | c | d", &mut launcher).0);
		let (stdins, stdouts): (Vec<_>, Vec<_>) = launcher.inherited.drain(..).unzip();
		let stdouts: Vec<fs::File> = stdouts.into_iter().flatten().collect();
		assert_eq!(stdouts.len(), 3);
		for stdout in &stdouts {
			assert!(!reader_closed(stdout));
		}
		drop(stdins);
		for stdout in &stdouts {
			assert!(reader_closed(stdout));
		}
	}

	#[test]
	fn segment_of_a_failed_spawn_is_still_closed() {
		let mut launcher = RecordingLauncher { fail_launch: vec![1], ..Default::default() };
		done(run("a | b | c", &mut launcher).0);
		assert_eq!(launcher.inherited.len(), 2);
		let (stdins, stdouts): (Vec<_>, Vec<_>) = launcher.inherited.drain(..).unzip();
		// a writes into the segment b never got; c reads from the one b never fed
		let a_stdout = stdouts.into_iter().next().flatten().unwrap();
		let c_stdin = stdins.into_iter().nth(1).flatten().unwrap();
		assert!(reader_closed(&a_stdout));
		assert!(writer_closed(&c_stdin));
	}

	#[test]
	fn exit_spawns_nothing() {
		for line in &["exit", "exit now", "exit | cat"] {
			let mut launcher = RecordingLauncher::default();
			let (r, _) = run(line, &mut launcher);
			assert!(matches!(r, Ok(EvalResult::Exit)));
			assert!(launcher.pipes.is_empty());
			assert!(launcher.launches.is_empty());
		}
	}

	#[test]
	fn empty_pipeline_spawns_nothing() {
		let mut launcher = RecordingLauncher::default();
		let job = done(eval(Pipeline { commands: vec![] }, &mut launcher, &mut Vec::<u8>::new()));
		assert!(job.is_empty());
		assert!(launcher.pipes.is_empty());
		assert!(launcher.launches.is_empty());
	}

	#[test]
	fn exit_only_counts_as_the_first_program() {
		let mut launcher = RecordingLauncher::default();
		done(run("echo exit", &mut launcher).0);
		assert_eq!(launcher.launches.len(), 1);
	}

	#[test]
	fn failed_spawn_leaves_the_rest_of_the_pipeline_running() {
		let mut launcher = RecordingLauncher { fail_launch: vec![0], ..Default::default() };
		let (r, stderr) = run("yes | head -1", &mut launcher);
		let job = done(r);

		assert_eq!(launcher.launches.len(), 2);
		assert!(!launcher.launches[0].spawned);
		assert!(launcher.launches[1].spawned);
		assert_eq!(launcher.launches[1].stdin, Some(launcher.pipes[0].0));
		assert_eq!(job.len(), 1);
		assert_eq!(job.processes[0].name, "head");
		assert_eq!(launcher.waited, vec![Pid::from_raw(1001)]);
		assert_eq!(stderr, format!("cshell: {}\n", Errno::EAGAIN.desc()));
	}

	#[test]
	fn pipe_failure_is_fatal() {
		let mut launcher = RecordingLauncher { fail_pipe: true, ..Default::default() };
		let (r, _) = run("ls | wc", &mut launcher);
		assert!(matches!(r, Err(ExecError::Pipe(Errno::EMFILE))));
		assert!(launcher.launches.is_empty());
	}

	#[test]
	fn argv_is_null_terminated() {
		let argv = Argv::new(&[&b"echo"[..], &b"hi"[..]]).unwrap();
		assert_eq!(argv.ptrs.len(), 3);
		assert!(argv.ptrs[2].is_null());
		assert_eq!(argv.not_found, b"cshell: echo: Command not found\n");
		assert!(Argv::new(&[&b"ec\0ho"[..]]).is_err());
	}
}
