//! Scheduler Types
//!
//! Core data structures for the EduKern scheduler.

use std::collections::{BTreeMap, VecDeque};

use serde::Deserialize;

use crate::objects::{Pid, Priority};

/// Ready-queue ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingPolicy {
    /// One FIFO; priority is recorded but ignored
    #[default]
    RoundRobin,
    /// One FIFO per level, lowest number first
    Priority,
}

/// Ready queue under a [`SchedulingPolicy`]
///
/// Round-robin keeps everything in a single level keyed 0.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    policy: SchedulingPolicy,
    levels: BTreeMap<Priority, VecDeque<Pid>>,
}

impl ReadyQueue {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self {
            policy,
            levels: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    fn level(&self, priority: Priority) -> Priority {
        match self.policy {
            SchedulingPolicy::RoundRobin => 0,
            SchedulingPolicy::Priority => priority,
        }
    }

    /// Append `pid` at the tail of its level
    ///
    /// # Returns
    /// false if the pid was already queued
    pub fn push(&mut self, pid: Pid, priority: Priority) -> bool {
        if self.contains(pid) {
            return false;
        }
        let level = self.level(priority);
        self.levels.entry(level).or_default().push_back(pid);
        true
    }

    /// Head of the first non-empty level
    pub fn pop(&mut self) -> Option<Pid> {
        let mut entry = self.levels.first_entry()?;
        let pid = entry.get_mut().pop_front();
        if entry.get().is_empty() {
            entry.remove();
        }
        pid
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.levels.values().any(|q| q.contains(&pid))
    }

    pub fn len(&self) -> usize {
        self.levels.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Queued pids in dispatch order
    pub fn snapshot(&self) -> Vec<Pid> {
        self.levels.values().flatten().copied().collect()
    }
}

/// Scheduler - manages runnable processes
///
/// Holds pids only; process records live in the process table.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: ReadyQueue,

    /// Process whose step is in progress
    current: Option<Pid>,

    /// Completed scheduling steps
    steps: u64,
}

impl Scheduler {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self {
            queue: ReadyQueue::new(policy),
            current: None,
            steps: 0,
        }
    }

    pub fn enqueue(&mut self, pid: Pid, priority: Priority) -> bool {
        self.queue.push(pid, priority)
    }

    pub fn dequeue(&mut self) -> Option<Pid> {
        self.queue.pop()
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn set_current(&mut self, pid: Option<Pid>) {
        self.current = pid;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn record_step(&mut self) {
        self.steps += 1;
    }

    pub fn queue(&self) -> &ReadyQueue {
        &self.queue
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
    }
}
