//! Process records and work
//!
//! A process's work is any `Fn(&mut ProcessContext) -> WorkResult` that is
//! `Send + Sync`. Work is shared (`Arc`) so that a forked child runs the
//! same code as its parent.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;

use crate::boot::KernelHandle;
use crate::error::KernelError;

/// Process identifier (monotonic, starts at 1)
pub type Pid = u32;

/// Scheduling priority, lower runs first under the priority policy
pub type Priority = u32;

pub const DEFAULT_PRIORITY: Priority = 1;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked => "blocked",
            ProcessState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Failure of one scheduling step
#[derive(Debug, Error)]
pub enum WorkError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

pub type WorkResult = core::result::Result<(), WorkError>;

/// Schedulable work
pub trait Work: Send + Sync {
    fn run(&self, ctx: &mut ProcessContext<'_>) -> WorkResult;
}

impl<F> Work for F
where
    F: Fn(&mut ProcessContext<'_>) -> WorkResult + Send + Sync,
{
    fn run(&self, ctx: &mut ProcessContext<'_>) -> WorkResult {
        self(ctx)
    }
}

pub type SharedWork = Arc<dyn Work>;

/// View of the running process handed to its work
pub struct ProcessContext<'k> {
    pid: Pid,
    name: String,
    parent: Option<Pid>,
    run_count: u64,
    kernel: &'k KernelHandle,
    exit_code: Option<i32>,
}

impl<'k> ProcessContext<'k> {
    pub(crate) fn new(
        pid: Pid,
        name: String,
        parent: Option<Pid>,
        run_count: u64,
        kernel: &'k KernelHandle,
    ) -> Self {
        Self {
            pid,
            name,
            parent,
            run_count,
            kernel,
            exit_code: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    /// Number of steps this process completed before the current one
    pub fn run_count(&self) -> u64 {
        self.run_count
    }

    /// Kernel handle for syscalls and spawning
    pub fn kernel(&self) -> &'k KernelHandle {
        self.kernel
    }

    /// Terminate this process with `code` once the current step returns
    pub fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }

    pub(crate) fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

/// How a scheduling step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { exit: Option<i32> },
    Faulted(String),
}

/// Process record
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    pub state: ProcessState,
    pub parent: Option<Pid>,
    pub exit_code: Option<i32>,
    pub created_at: SystemTime,
    /// Accumulated execution time across all steps
    pub cpu_time: Duration,
    pub run_count: u64,
    pub(crate) terminated_at: Option<Instant>,
    pub(crate) work: SharedWork,
}

impl Process {
    pub(crate) fn new(
        pid: Pid,
        name: String,
        priority: Priority,
        parent: Option<Pid>,
        work: SharedWork,
    ) -> Self {
        Self {
            pid,
            name,
            priority,
            state: ProcessState::Ready,
            parent,
            exit_code: None,
            created_at: SystemTime::now(),
            cpu_time: Duration::ZERO,
            run_count: 0,
            terminated_at: None,
            work,
        }
    }

    pub(crate) fn terminate(&mut self, code: i32, now: Instant) {
        self.state = ProcessState::Terminated;
        self.exit_code = Some(code);
        self.terminated_at = Some(now);
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name.clone(),
            priority: self.priority,
            state: self.state,
            parent: self.parent,
            exit_code: self.exit_code,
            created_at: self.created_at,
            cpu_time: self.cpu_time,
            run_count: self.run_count,
        }
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("parent", &self.parent)
            .field("exit_code", &self.exit_code)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a process record, as returned by `ps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    pub state: ProcessState,
    pub parent: Option<Pid>,
    pub exit_code: Option<i32>,
    pub created_at: SystemTime,
    pub cpu_time: Duration,
    pub run_count: u64,
}
