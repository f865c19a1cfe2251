//! Process Object Model
//!
//! Processes are the kernel's schedulable units of work. Each one is a
//! record in the [`ProcessTable`] plus a shared piece of work that the
//! scheduler runs to completion once per scheduling step.
//!
//! ## Lifecycle
//!
//! - **Ready**: created, or back from a completed step
//! - **Running**: dequeued by the scheduler, work in progress
//! - **Blocked**: reserved, never entered by the scheduler itself
//! - **Terminated**: exited or faulted; absorbing, purged after a grace window

pub mod process;
pub mod process_table;

pub use process::{
    Pid, Priority, Process, ProcessContext, ProcessInfo, ProcessState, RunOutcome, SharedWork,
    Work, WorkError, WorkResult, DEFAULT_PRIORITY,
};
pub use process_table::{ProcessTable, RunTicket, FAULT_EXIT_CODE};

use thiserror::Error;

/// Process table errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("Unknown process: {pid}")]
    UnknownProcess { pid: Pid },

    #[error("Invalid priority {priority}: must be at least 1")]
    InvalidPriority { priority: Priority },
}

pub type Result<T> = core::result::Result<T, ProcessError>;
