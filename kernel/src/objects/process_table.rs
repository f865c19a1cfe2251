//! Process table
//!
//! Owns every process record. The scheduler only ever holds pids and asks
//! the table to move a process into and out of `Running`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::process::{Pid, Priority, Process, ProcessInfo, ProcessState, RunOutcome, SharedWork};
use super::{ProcessError, Result};

/// Exit code recorded for faults and forced termination
pub const FAULT_EXIT_CODE: i32 = -1;

/// Everything the scheduler needs to run one step outside the table lock
pub struct RunTicket {
    pub pid: Pid,
    pub name: String,
    pub parent: Option<Pid>,
    pub run_count: u64,
    pub work: SharedWork,
}

#[derive(Debug)]
pub struct ProcessTable {
    processes: BTreeMap<Pid, Process>,
    next_pid: Pid,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            processes: BTreeMap::new(),
            next_pid: 1,
        }
    }

    fn allocate_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    /// Create a ready process
    ///
    /// # Errors
    /// `InvalidPriority` if `priority` is 0
    pub fn create(&mut self, name: &str, work: SharedWork, priority: Priority) -> Result<Pid> {
        if priority == 0 {
            return Err(ProcessError::InvalidPriority { priority });
        }
        let pid = self.allocate_pid();
        self.processes
            .insert(pid, Process::new(pid, name.to_string(), priority, None, work));
        log::debug!("[proc] Created {} '{}' (priority {})", pid, name, priority);
        Ok(pid)
    }

    /// Fork `parent`: the child shares its work and priority
    ///
    /// # Errors
    /// `UnknownProcess` if the parent is missing or terminated
    pub fn fork(&mut self, parent: Pid) -> Result<Pid> {
        let (name, priority, work) = match self.processes.get(&parent) {
            Some(p) if p.state != ProcessState::Terminated => {
                (format!("{}_child", p.name), p.priority, Arc::clone(&p.work))
            }
            _ => return Err(ProcessError::UnknownProcess { pid: parent }),
        };

        let pid = self.allocate_pid();
        self.processes
            .insert(pid, Process::new(pid, name, priority, Some(parent), work));
        log::debug!("[proc] Forked {} from {}", pid, parent);
        Ok(pid)
    }

    /// Terminate a process
    ///
    /// # Returns
    /// false if the pid is unknown or already terminated
    pub fn exit(&mut self, pid: Pid, code: i32, now: Instant) -> bool {
        match self.processes.get_mut(&pid) {
            Some(p) if p.state != ProcessState::Terminated => {
                p.terminate(code, now);
                log::debug!("[proc] {} exited with code {}", pid, code);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    /// Snapshots of all records, ordered by pid
    pub fn list(&self) -> Vec<ProcessInfo> {
        self.processes.values().map(Process::info).collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Force-terminate every running process with the fault exit code
    pub fn kill_running(&mut self, now: Instant) -> Vec<Pid> {
        let mut killed = Vec::new();
        for p in self.processes.values_mut() {
            if p.state == ProcessState::Running {
                p.terminate(FAULT_EXIT_CODE, now);
                killed.push(p.pid);
            }
        }
        killed
    }

    /// Drop terminated records older than `grace`
    pub fn reap(&mut self, now: Instant, grace: Duration) -> Vec<Pid> {
        let expired: Vec<Pid> = self
            .processes
            .values()
            .filter(|p| {
                p.terminated_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= grace)
            })
            .map(|p| p.pid)
            .collect();
        for pid in &expired {
            self.processes.remove(pid);
        }
        if !expired.is_empty() {
            log::debug!("[proc] Reaped {:?}", expired);
        }
        expired
    }

    /// Move a ready process to `Running`
    ///
    /// # Returns
    /// None if the pid is gone or not ready (a stale queue entry)
    pub fn begin_run(&mut self, pid: Pid) -> Option<RunTicket> {
        let p = self.processes.get_mut(&pid)?;
        if p.state != ProcessState::Ready {
            return None;
        }
        p.state = ProcessState::Running;
        Some(RunTicket {
            pid,
            name: p.name.clone(),
            parent: p.parent,
            run_count: p.run_count,
            work: Arc::clone(&p.work),
        })
    }

    /// Record the end of a step
    ///
    /// A process terminated while its step ran (by `exit` or shutdown)
    /// stays terminated.
    ///
    /// # Returns
    /// The updated record, or None if it was removed meanwhile
    pub fn finish_run(
        &mut self,
        pid: Pid,
        outcome: RunOutcome,
        elapsed: Duration,
        now: Instant,
    ) -> Option<ProcessInfo> {
        let p = self.processes.get_mut(&pid)?;
        p.cpu_time += elapsed;
        p.run_count += 1;

        if p.state == ProcessState::Running {
            match outcome {
                RunOutcome::Completed { exit: None } => p.state = ProcessState::Ready,
                RunOutcome::Completed { exit: Some(code) } => p.terminate(code, now),
                RunOutcome::Faulted(reason) => {
                    log::warn!("[proc] {} '{}' faulted: {}", pid, p.name, reason);
                    p.terminate(FAULT_EXIT_CODE, now);
                }
            }
        }
        Some(p.info())
    }
}
