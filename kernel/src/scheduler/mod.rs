//! Process Scheduler
//!
//! Cooperative, run-to-completion scheduling over the ready queue.
//!
//! # Architecture
//!
//! Each tick:
//! 1. Reaps terminated processes past the grace window
//! 2. Dequeues at most one pid
//! 3. Moves it to `Running` and runs its work with no kernel lock held
//! 4. Records the outcome; a panic or error return terminates it with -1
//! 5. Re-enqueues it if it is still ready
//!
//! Steps never overlap: a tick that finds another step in progress
//! returns [`TickReport::Busy`] instead of waiting.
//!
//! # Integration Points
//! - [`timer::Ticker`] drives ticks periodically and raises the timer line
//! - `KernelHandle::tick` drives a single step by hand

pub mod timer;
pub mod types;

pub use timer::Ticker;
pub use types::{ReadyQueue, Scheduler, SchedulingPolicy};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::TryLockError;
use std::time::{Duration, Instant};

use crate::boot::KernelHandle;
use crate::error::Result;
use crate::ksched_debug;
use crate::lock;
use crate::objects::{Pid, ProcessContext, ProcessState, RunOutcome};

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// Ready queue was empty
    Idle,
    /// Another step was already in progress
    Busy,
    /// Dequeued pid was no longer runnable
    Skipped { pid: Pid },
    /// One step ran
    Ran {
        pid: Pid,
        state: ProcessState,
        elapsed: Duration,
    },
}

/// Run one scheduling step
///
/// # Errors
/// `NotRunning` if the kernel has been shut down
pub fn tick(handle: &KernelHandle) -> Result<TickReport> {
    let state = handle.state()?;

    let _step = match state.step_gate.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return Ok(TickReport::Busy),
    };

    drop(state.reaped_processes());

    let Some(pid) = lock(&state.scheduler).dequeue() else {
        return Ok(TickReport::Idle);
    };

    let Some(ticket) = lock(&state.processes).begin_run(pid) else {
        ksched_debug!("[sched] pid {} no longer runnable, skipped", pid);
        return Ok(TickReport::Skipped { pid });
    };
    lock(&state.scheduler).set_current(Some(pid));
    ksched_debug!("[sched] running {} '{}'", pid, ticket.name);

    let mut ctx = ProcessContext::new(
        ticket.pid,
        ticket.name,
        ticket.parent,
        ticket.run_count,
        handle,
    );
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| ticket.work.run(&mut ctx)));
    let elapsed = started.elapsed();

    let outcome = match result {
        Ok(Ok(())) => RunOutcome::Completed {
            exit: ctx.exit_code(),
        },
        Ok(Err(err)) => RunOutcome::Faulted(err.to_string()),
        Err(payload) => RunOutcome::Faulted(panic_message(payload.as_ref())),
    };

    let info = lock(&state.processes).finish_run(pid, outcome, elapsed, Instant::now());

    let mut scheduler = lock(&state.scheduler);
    scheduler.set_current(None);
    scheduler.record_step();

    let final_state = match info {
        Some(info) => {
            if info.state == ProcessState::Ready {
                scheduler.enqueue(pid, info.priority);
            }
            info.state
        }
        None => ProcessState::Terminated,
    };
    ksched_debug!("[sched] {} -> {} after {:?}", pid, final_state, elapsed);

    Ok(TickReport::Ran {
        pid,
        state: final_state,
        elapsed,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
