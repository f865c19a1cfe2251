//! Periodic scheduler timer
//!
//! A dedicated thread waits on a `crossbeam` tick channel. Every period it
//! raises the timer interrupt line and runs one scheduling step. Stopping
//! signals the thread and joins it, so a step in progress always finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use crossbeam::select;

use crate::boot::KernelHandle;
use crate::error::{KernelError, Result};
use crate::interrupts::TIMER;

pub struct Ticker {
    stop: Sender<()>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn the timer thread
    ///
    /// # Errors
    /// `Io` if the thread cannot be spawned
    pub fn start(handle: KernelHandle, period: Duration) -> Result<Self> {
        let (stop, stopped) = channel::bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("edukern-sched".into())
            .spawn(move || {
                let ticks = channel::tick(period);
                log::debug!("[sched] timer started, period {:?}", period);
                loop {
                    select! {
                        recv(ticks) -> _ => {
                            if !flag.load(Ordering::Acquire) {
                                break;
                            }
                            handle.interrupts().trigger(TIMER, None);
                            if let Err(KernelError::NotRunning) = super::tick(&handle) {
                                break;
                            }
                        }
                        recv(stopped) -> _ => break,
                    }
                }
                log::debug!("[sched] timer stopped");
            })?;

        Ok(Self {
            stop,
            running,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Halt future ticks and wait for the current one
    ///
    /// Called from process work on the timer thread itself, this only
    /// signals; the thread exits after the step returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let _ = self.stop.try_send(());

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                log::error!("[sched] timer thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
