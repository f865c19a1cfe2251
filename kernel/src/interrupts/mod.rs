//! Interrupt Dispatcher
//!
//! Serialized, strictly FIFO delivery of interrupts to numbered handler
//! slots.
//!
//! ## Architecture
//!
//! - `trigger()` pushes onto a `crossbeam` unbounded channel
//! - One worker thread drains the channel, one interrupt at a time, so a
//!   slow handler delays everything behind it and handlers never re-enter
//! - A handler error or panic is logged and counted; draining continues
//! - Interrupts on lines without a handler are dropped
//!
//! ## Lines
//!
//! | line | use |
//! |---|---|
//! | 0 | exception |
//! | 1 | keyboard |
//! | 2 | timer (raised by the scheduler timer) |
//! | 3 | syscall (raised by the router, payload = syscall name) |
//!
//! Any other line may be registered freely.

pub mod handlers;

pub use handlers::{Handler, HandlerError, HandlerResult};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::Result;
use crate::lock;

/// Interrupt line number
pub type Line = u32;

pub const EXCEPTION: Line = 0;
pub const KEYBOARD: Line = 1;
pub const TIMER: Line = 2;
pub const SYSCALL: Line = 3;

/// A queued interrupt
#[derive(Debug, Clone)]
pub struct Interrupt {
    pub line: Line,
    pub payload: Option<Vec<u8>>,
    pub raised_at: Instant,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptStats {
    /// Handled without error
    pub delivered: u64,
    /// No handler registered for the line
    pub dropped: u64,
    /// Handler returned an error or panicked
    pub faulted: u64,
}

struct Shared {
    handlers: Mutex<HashMap<Line, Handler>>,
    pending: Mutex<usize>,
    idle: Condvar,
    stats: Mutex<InterruptStats>,
}

impl Shared {
    fn handler(&self, line: Line) -> Option<Handler> {
        lock(&self.handlers).get(&line).cloned()
    }

    fn deliver(&self, irq: &Interrupt) {
        let Some(handler) = self.handler(irq.line) else {
            lock(&self.stats).dropped += 1;
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(irq))) {
            Ok(Ok(())) => lock(&self.stats).delivered += 1,
            Ok(Err(err)) => {
                log::error!("[irq] handler for line {} failed: {}", irq.line, err);
                lock(&self.stats).faulted += 1;
            }
            Err(_) => {
                log::error!("[irq] handler for line {} panicked", irq.line);
                lock(&self.stats).faulted += 1;
            }
        }
    }

    fn done(&self) {
        let mut pending = lock(&self.pending);
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Interrupt controller
pub struct InterruptController {
    shared: Arc<Shared>,
    sender: Mutex<Option<Sender<Interrupt>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptController {
    /// Create a disabled controller with no handlers
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                handlers: Mutex::new(HashMap::new()),
                pending: Mutex::new(0),
                idle: Condvar::new(),
                stats: Mutex::new(InterruptStats::default()),
            }),
            sender: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Start accepting interrupts
    ///
    /// Installs the default handlers on lines 0 to 3 that have none and
    /// spawns the drain worker. Enabling twice is a no-op.
    ///
    /// # Errors
    /// `Io` if the worker thread cannot be spawned
    pub fn enable(&self) -> Result<()> {
        let mut sender = lock(&self.sender);
        if sender.is_some() {
            return Ok(());
        }

        {
            let mut table = lock(&self.shared.handlers);
            for (line, handler) in handlers::defaults() {
                table.entry(line).or_insert(handler);
            }
        }

        let (tx, rx) = channel::unbounded();
        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("edukern-irq".into())
            .spawn(move || drain(shared, rx))?;

        *sender = Some(tx);
        *lock(&self.worker) = Some(worker);
        log::debug!("[irq] enabled");
        Ok(())
    }

    /// Stop accepting interrupts and drain what is queued
    pub fn disable(&self) {
        // Dropping the sender ends the worker once the queue is empty
        if lock(&self.sender).take().is_none() {
            return;
        }

        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("[irq] worker thread panicked");
            }
        }
        log::debug!("[irq] disabled");
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.sender).is_some()
    }

    /// Install `handler` on `line`, replacing any previous one
    pub fn register_handler<F>(&self, line: Line, handler: F)
    where
        F: Fn(&Interrupt) -> HandlerResult + Send + Sync + 'static,
    {
        lock(&self.shared.handlers).insert(line, Arc::new(handler));
    }

    /// Remove the handler on `line`
    ///
    /// # Returns
    /// true if a handler was installed
    pub fn unregister_handler(&self, line: Line) -> bool {
        lock(&self.shared.handlers).remove(&line).is_some()
    }

    pub fn has_handler(&self, line: Line) -> bool {
        lock(&self.shared.handlers).contains_key(&line)
    }

    /// Queue an interrupt
    ///
    /// # Returns
    /// false when the controller is disabled
    pub fn trigger(&self, line: Line, payload: Option<Vec<u8>>) -> bool {
        let sender = lock(&self.sender);
        let Some(tx) = sender.as_ref() else {
            return false;
        };

        *lock(&self.shared.pending) += 1;
        let irq = Interrupt {
            line,
            payload,
            raised_at: Instant::now(),
        };
        if tx.send(irq).is_err() {
            self.shared.done();
            return false;
        }
        true
    }

    /// Block until every queued interrupt has been handled
    ///
    /// Returns immediately when called from a handler.
    pub fn wait_idle(&self) {
        if self.on_worker_thread() {
            return;
        }
        let mut pending = lock(&self.shared.pending);
        while *pending > 0 {
            pending = self
                .shared
                .idle
                .wait(pending)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Interrupts accepted but not yet handled
    pub fn pending(&self) -> usize {
        *lock(&self.shared.pending)
    }

    pub fn stats(&self) -> InterruptStats {
        *lock(&self.shared.stats)
    }

    fn on_worker_thread(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|w| w.thread().id() == thread::current().id())
    }
}

impl Drop for InterruptController {
    fn drop(&mut self) {
        self.disable();
    }
}

fn drain(shared: Arc<Shared>, rx: Receiver<Interrupt>) {
    for irq in rx.iter() {
        shared.deliver(&irq);
        shared.done();
    }
}
