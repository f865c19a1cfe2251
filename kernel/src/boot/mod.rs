//! Boot sequence and kernel context
//!
//! This module handles the kernel lifecycle:
//! 1. Initializing the page allocator from configuration
//! 2. Mounting the root file system and seeding it
//! 3. Registering host overlays (configuration, then `SYNC_DIRS`)
//! 4. Starting the scheduler timer
//! 5. Enabling interrupts
//! 6. Spawning `init`
//!
//! Shutdown reverses it: stop the timer, force-terminate running processes,
//! disable interrupts, close every open handle.
//!
//! There is no global kernel. [`Kernel`] owns one boot's worth of state and
//! hands out cloneable [`KernelHandle`]s; a handle from an earlier boot
//! fails with `NotRunning`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::interrupts::{InterruptController, SYSCALL};
use crate::lock;
use crate::memory::{BlockId, MemoryInfo, PageAllocator};
use crate::objects::{
    Pid, Priority, ProcessContext, ProcessError, ProcessInfo, ProcessState, ProcessTable,
    SharedWork, WorkResult, DEFAULT_PRIORITY,
};
use crate::scheduler::{self, Scheduler, TickReport, Ticker};
use crate::syscall::{Arg, Syscall, SyscallResult};
use edukern_vfs::{DirEntry, OpenMode, OverlayMapping, Vfs};

/// Everything one boot owns, each component behind its own lock
pub(crate) struct KernelState {
    pub(crate) config: KernelConfig,
    pub(crate) memory: Mutex<PageAllocator>,
    pub(crate) vfs: Mutex<Vfs>,
    pub(crate) processes: Mutex<ProcessTable>,
    pub(crate) scheduler: Mutex<Scheduler>,
    pub(crate) interrupts: InterruptController,
    /// Held for the whole of a scheduling step
    pub(crate) step_gate: Mutex<()>,
    running: AtomicBool,
}

impl KernelState {
    /// Lock the process table after purging records past the grace window
    pub(crate) fn reaped_processes(&self) -> MutexGuard<'_, ProcessTable> {
        let mut table = lock(&self.processes);
        table.reap(Instant::now(), self.config.scheduler.grace_period());
        table
    }
}

/// Kernel context
pub struct Kernel {
    config: KernelConfig,
    state: Option<Arc<KernelState>>,
    ticker: Option<Ticker>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            state: None,
            ticker: None,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    /// Boot from empty state
    ///
    /// # Returns
    /// A handle for issuing syscalls
    ///
    /// # Errors
    /// `AlreadyRunning` if booted and not shut down; `Config` for an invalid
    /// configuration; a VFS error if an overlay prefix is blocked by a file
    pub fn boot(&mut self) -> Result<KernelHandle> {
        if self.state.is_some() {
            return Err(KernelError::AlreadyRunning);
        }
        self.config.validate()?;
        log::info!("[boot] EduKern starting");

        let memory = PageAllocator::new(self.config.memory.total_bytes, self.config.memory.page_size);
        let info = memory.info();
        log::info!(
            "[boot] memory: {} pages x {} bytes",
            info.pages.total,
            memory.page_size()
        );

        let mut vfs = Vfs::new();
        if self.config.fs.seed {
            vfs.mount()?;
        }
        for mapping in self.config.overlay_mappings() {
            vfs.register_overlay(mapping)?;
        }

        let state = Arc::new(KernelState {
            config: self.config.clone(),
            memory: Mutex::new(memory),
            vfs: Mutex::new(vfs),
            processes: Mutex::new(ProcessTable::new()),
            scheduler: Mutex::new(Scheduler::new(self.config.scheduler.policy)),
            interrupts: InterruptController::new(),
            step_gate: Mutex::new(()),
            running: AtomicBool::new(true),
        });
        self.state = Some(Arc::clone(&state));
        let handle = KernelHandle { state };

        if let Err(err) = self.start_services(&handle) {
            log::error!("[boot] failed: {}", err);
            self.shutdown();
            return Err(err);
        }

        log::info!("[boot] kernel running");
        Ok(handle)
    }

    fn start_services(&mut self, handle: &KernelHandle) -> Result<()> {
        if self.config.scheduler.autostart {
            self.start_scheduler()?;
        }
        if self.config.interrupts.enabled {
            handle.state.interrupts.enable()?;
        }
        if self.config.scheduler.spawn_init {
            let pid = handle.spawn("init", init)?;
            log::info!("[boot] init is pid {}", pid);
        }
        Ok(())
    }

    /// Tear down the running kernel; a no-op when not running
    pub fn shutdown(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        log::info!("[boot] shutting down");

        self.stop_scheduler();

        let killed = lock(&state.processes).kill_running(Instant::now());
        if !killed.is_empty() {
            log::warn!("[boot] force-terminated running processes {:?}", killed);
        }
        lock(&state.scheduler).clear();

        state.interrupts.disable();
        let closed = lock(&state.vfs).close_all();
        state.running.store(false, Ordering::Release);

        log::info!("[boot] halted ({} open handles closed)", closed);
    }

    /// Handle to the running kernel
    ///
    /// # Errors
    /// `NotRunning` before boot or after shutdown
    pub fn handle(&self) -> Result<KernelHandle> {
        self.state
            .as_ref()
            .map(|state| KernelHandle {
                state: Arc::clone(state),
            })
            .ok_or(KernelError::NotRunning)
    }

    /// Start the periodic timer; a no-op if it is already running
    ///
    /// # Errors
    /// `NotRunning` when not booted
    pub fn start_scheduler(&mut self) -> Result<()> {
        if self.ticker.as_ref().is_some_and(Ticker::is_running) {
            return Ok(());
        }
        let handle = self.handle()?;
        self.ticker = Some(Ticker::start(handle, self.config.scheduler.quantum())?);
        log::info!("[sched] started, quantum {}ms", self.config.scheduler.quantum_ms);
        Ok(())
    }

    /// Stop the periodic timer, letting a step in progress finish
    pub fn stop_scheduler(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
            log::info!("[sched] stopped");
        }
    }

    pub fn is_scheduler_running(&self) -> bool {
        self.ticker.as_ref().is_some_and(Ticker::is_running)
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn init(ctx: &mut ProcessContext<'_>) -> WorkResult {
    if ctx.run_count() == 0 {
        let shell = ctx.kernel().spawn("shell", idle)?;
        log::info!("[boot] init spawned shell as pid {}", shell);
    }
    Ok(())
}

fn idle(_ctx: &mut ProcessContext<'_>) -> WorkResult {
    Ok(())
}

/// Cloneable access to a booted kernel
#[derive(Clone)]
pub struct KernelHandle {
    state: Arc<KernelState>,
}

impl std::fmt::Debug for KernelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelHandle").finish_non_exhaustive()
    }
}

impl KernelHandle {
    pub(crate) fn state(&self) -> Result<&KernelState> {
        if self.state.running.load(Ordering::Acquire) {
            Ok(&self.state)
        } else {
            Err(KernelError::NotRunning)
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.state.config
    }

    pub fn interrupts(&self) -> &InterruptController {
        &self.state.interrupts
    }

    // ---- syscall router ----

    /// Route a named syscall
    ///
    /// # Errors
    /// `UnknownSyscall`, `InvalidArgument`, `NotRunning`, or whatever the
    /// owning component returns
    pub fn syscall(&self, name: &str, args: &[Arg]) -> Result<SyscallResult> {
        let call = Syscall::from_name(name, args)?;
        self.dispatch(call)
    }

    /// Execute a decoded syscall
    pub fn dispatch(&self, call: Syscall) -> Result<SyscallResult> {
        let state = self.state()?;
        state
            .interrupts
            .trigger(SYSCALL, Some(call.name().as_bytes().to_vec()));
        log::trace!("[syscall] {:?}", call);

        Ok(match call {
            Syscall::Open { path, mode } => {
                let mode = OpenMode::parse(&mode)?;
                SyscallResult::Descriptor(lock(&state.vfs).open(&path, mode)?)
            }
            Syscall::Read { fd, max_len } => SyscallResult::Data(lock(&state.vfs).read(fd, max_len)?),
            Syscall::Write { fd, data } => SyscallResult::Written(lock(&state.vfs).write(fd, &data)?),
            Syscall::Close { fd } => SyscallResult::Flag(lock(&state.vfs).close(fd)),
            Syscall::Fork { parent } => SyscallResult::Pid(self.fork(parent)?),
            Syscall::Exit { pid, code } => SyscallResult::Flag(self.exit(pid, code)?),
            Syscall::Malloc { size, owner } => SyscallResult::Block(self.allocate(size, owner)?),
            Syscall::Free { block } => {
                self.free(block)?;
                SyscallResult::Flag(true)
            }
            Syscall::Ps => SyscallResult::Processes(self.list_processes()?),
            Syscall::Ls { path } => SyscallResult::Entries(self.list(&path)?),
            Syscall::Meminfo => SyscallResult::MemInfo(self.meminfo()?),
        })
    }

    // ---- processes ----

    /// Create a ready process and enqueue it
    ///
    /// # Errors
    /// `InvalidPriority` if `priority` is 0
    pub fn create_process<F>(&self, name: &str, priority: Priority, work: F) -> Result<Pid>
    where
        F: Fn(&mut ProcessContext<'_>) -> WorkResult + Send + Sync + 'static,
    {
        self.create_process_with(name, priority, Arc::new(work))
    }

    /// [`create_process`](Self::create_process) with already shared work
    pub fn create_process_with(&self, name: &str, priority: Priority, work: SharedWork) -> Result<Pid> {
        let state = self.state()?;
        let pid = lock(&state.processes).create(name, work, priority)?;
        lock(&state.scheduler).enqueue(pid, priority);
        Ok(pid)
    }

    /// Create a process at the default priority
    pub fn spawn<F>(&self, name: &str, work: F) -> Result<Pid>
    where
        F: Fn(&mut ProcessContext<'_>) -> WorkResult + Send + Sync + 'static,
    {
        self.create_process(name, DEFAULT_PRIORITY, work)
    }

    /// Fork `parent` and enqueue the child
    ///
    /// # Errors
    /// `UnknownProcess` if the parent is missing or terminated
    pub fn fork(&self, parent: Pid) -> Result<Pid> {
        let state = self.state()?;
        let (child, priority) = {
            let mut table = lock(&state.processes);
            let child = table.fork(parent)?;
            let priority = table.get(child).map_or(DEFAULT_PRIORITY, |p| p.priority);
            (child, priority)
        };
        lock(&state.scheduler).enqueue(child, priority);
        Ok(child)
    }

    /// Terminate `pid` with `code`
    ///
    /// # Returns
    /// false if the pid is unknown or already terminated
    pub fn exit(&self, pid: Pid, code: i32) -> Result<bool> {
        let state = self.state()?;
        Ok(lock(&state.processes).exit(pid, code, Instant::now()))
    }

    /// Put a ready process back on the run queue
    ///
    /// # Errors
    /// `UnknownProcess` if the pid is missing or not ready
    pub fn enqueue(&self, pid: Pid) -> Result<()> {
        let state = self.state()?;
        let priority = match lock(&state.processes).get(pid) {
            Some(p) if p.state == ProcessState::Ready => p.priority,
            _ => return Err(ProcessError::UnknownProcess { pid }.into()),
        };
        lock(&state.scheduler).enqueue(pid, priority);
        Ok(())
    }

    pub fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
        let state = self.state()?;
        Ok(state.reaped_processes().list())
    }

    pub fn process(&self, pid: Pid) -> Result<Option<ProcessInfo>> {
        let state = self.state()?;
        Ok(state.reaped_processes().get(pid).map(|p| p.info()))
    }

    /// Queued pids in dispatch order
    pub fn ready_queue(&self) -> Result<Vec<Pid>> {
        let state = self.state()?;
        Ok(lock(&state.scheduler).queue().snapshot())
    }

    /// Run one scheduling step on the calling thread
    pub fn tick(&self) -> Result<TickReport> {
        scheduler::tick(self)
    }

    // ---- file system ----

    pub fn mkdir(&self, path: &str) -> Result<()> {
        let state = self.state()?;
        Ok(lock(&state.vfs).mkdir(path)?)
    }

    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let state = self.state()?;
        Ok(lock(&state.vfs).write_file(path, data)?)
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let state = self.state()?;
        Ok(lock(&state.vfs).read_file(path)?)
    }

    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let state = self.state()?;
        Ok(lock(&state.vfs).list(path)?)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        let state = self.state()?;
        Ok(lock(&state.vfs).exists(path))
    }

    pub fn is_dir(&self, path: &str) -> Result<bool> {
        let state = self.state()?;
        Ok(lock(&state.vfs).is_dir(path))
    }

    /// Mirror `virtual_prefix` to the host directory `host_root`
    pub fn register_overlay(&self, host_root: impl Into<PathBuf>, virtual_prefix: &str) -> Result<()> {
        let state = self.state()?;
        let mapping = OverlayMapping::new(host_root, virtual_prefix);
        Ok(lock(&state.vfs).register_overlay(mapping)?)
    }

    // ---- memory ----

    pub fn allocate(&self, size: usize, owner: Option<Pid>) -> Result<BlockId> {
        let state = self.state()?;
        Ok(lock(&state.memory).allocate(size, owner)?)
    }

    pub fn free(&self, block: BlockId) -> Result<()> {
        let state = self.state()?;
        Ok(lock(&state.memory).free(block)?)
    }

    pub fn meminfo(&self) -> Result<MemoryInfo> {
        let state = self.state()?;
        Ok(lock(&state.memory).info())
    }

    pub fn read_block(&self, block: BlockId, offset: usize, len: usize) -> Result<Vec<u8>> {
        let state = self.state()?;
        Ok(lock(&state.memory).read(block, offset, len)?)
    }

    pub fn write_block(&self, block: BlockId, offset: usize, bytes: &[u8]) -> Result<()> {
        let state = self.state()?;
        Ok(lock(&state.memory).write(block, offset, bytes)?)
    }
}
