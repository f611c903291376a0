use nix::errno::Errno;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::eval::Launcher;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum State { Active, Stopped, Terminated }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) => State::Terminated,
			WaitStatus::Signaled(..) => State::Terminated,
			WaitStatus::Continued(..) => State::Active,
			WaitStatus::StillAlive => State::Active,
			_ => State::Stopped,
		}
	}

	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
			_ => None,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Process {
	pub pid: Pid,
	pub name: String,
	pub status: WaitStatus,
	/// Set when the process is gone without a status being collected for it.
	pub lost: bool,
}

impl Process {
	pub fn state(&self) -> State {
		if self.lost { State::Terminated } else { self.status.state() }
	}
}

/// The processes actually spawned for one pipeline, in pipeline order.
#[derive(Debug, Default)]
pub struct Job {
	pub processes: Vec<Process>,
}

impl Job {
	pub fn new(size_hint: usize) -> Job {
		Job { processes: Vec::with_capacity(size_hint) }
	}

	pub fn push(&mut self, pid: Pid, name: String) {
		self.processes.push(Process { pid, name, status: WaitStatus::StillAlive, lost: false });
	}

	pub fn len(&self) -> usize {
		self.processes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}

	pub fn state(&self) -> State {
		self.processes.iter().map(Process::state).min().unwrap_or(State::Terminated)
	}

	/// Exit code of the last spawned process, if its status was collected.
	pub fn code(&self) -> Option<i32> {
		self.processes.last().and_then(|pr| pr.status.code())
	}

	/// Blocks until every process has exited or been killed. Stopped processes
	/// are not terminal, so waiting on them continues.
	pub fn wait(&mut self, launcher: &mut dyn Launcher) -> nix::Result<()> {
		for pr in self.processes.iter_mut() {
			while pr.state() != State::Terminated {
				match launcher.wait(pr.pid) {
					Ok(status) => {
						tracing::debug!(pid = %pr.pid, name = %pr.name, ?status, "reaped");
						pr.status = status;
					},
					Err(Errno::ECHILD) => {
						tracing::debug!(pid = %pr.pid, "no such child");
						pr.lost = true;
					},
					Err(e) => { return Err(e); },
				}
			}
		}
		Ok(())
	}
}
