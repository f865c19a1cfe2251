//! Integration tests for the complete kernel
//!
//! These tests drive a booted kernel through its public surface:
//! - Syscall router end to end (files, memory, processes)
//! - Boot / shutdown / reboot
//! - Scheduling steps, faults and the periodic timer
//! - Interrupt ordering and containment

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use edukern_kernel::interrupts::SYSCALL;
use edukern_kernel::scheduler::SchedulingPolicy;
use edukern_kernel::vfs::NodeKind;
use edukern_kernel::*;

/// Deterministic kernel: no timer thread, no init, no environment overlays
fn manual_config() -> KernelConfig {
    let mut config = KernelConfig::default();
    config.scheduler.autostart = false;
    config.scheduler.spawn_init = false;
    config.fs.sync_env = None;
    config
}

fn boot(config: KernelConfig) -> (Kernel, KernelHandle) {
    let mut kernel = Kernel::new(config);
    let handle = kernel.boot().expect("boot");
    (kernel, handle)
}

fn state_of(k: &KernelHandle, pid: Pid) -> ProcessState {
    k.process(pid).unwrap().expect("process exists").state
}

/// Test the documented file round trip through syscalls
#[test]
fn test_file_round_trip_scenario() {
    let (mut kernel, k) = boot(manual_config());

    k.mkdir("/home/u").unwrap();
    k.write_file("/home/u/f.txt", b"hello").unwrap();

    let entries = syscall!(k, "ls", "/home/u").unwrap();
    let entries = entries.entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "f.txt");
    assert_eq!(entries[0].kind, NodeKind::File);
    assert_eq!(entries[0].size, 5);

    let fd = syscall!(k, "open", "/home/u/f.txt", "r").unwrap().descriptor().unwrap();
    assert_eq!(fd, 3);
    let chunk = syscall!(k, "read", fd, 64 * 1024usize).unwrap();
    assert_eq!(chunk.data().unwrap(), b"hello");
    let chunk = syscall!(k, "read", fd, 64 * 1024usize).unwrap();
    assert_eq!(chunk.data().unwrap(), b"");
    assert_eq!(syscall!(k, "close", fd).unwrap().flag(), Some(true));
    assert_eq!(syscall!(k, "close", fd).unwrap().flag(), Some(false));

    kernel.shutdown();
}

/// Test descriptor errors and modes through the router
#[test]
fn test_descriptor_errors() {
    let (_kernel, k) = boot(manual_config());

    let err = syscall!(k, "read", 42u32, 10usize).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadDescriptor);

    let err = syscall!(k, "open", "/tmp/missing", "r").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileNotFound);

    let err = syscall!(k, "open", "/nope/file", "w").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathNotFound);

    let err = syscall!(k, "open", "/tmp/x", "z").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidMode);

    let fd = syscall!(k, "open", "/tmp/log", "a").unwrap().descriptor().unwrap();
    syscall!(k, "write", fd, "one ").unwrap();
    syscall!(k, "write", fd, "two").unwrap();
    syscall!(k, "close", fd).unwrap();
    assert_eq!(k.read_file("/tmp/log").unwrap(), b"one two");

    let fd = syscall!(k, "open", "/tmp/log", "r").unwrap().descriptor().unwrap();
    let err = syscall!(k, "write", fd, "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongMode);
}

/// Test memory syscalls and page conservation
#[test]
fn test_memory_syscalls() {
    let (_kernel, k) = boot(manual_config());
    let before = syscall!(k, "meminfo").unwrap().meminfo().unwrap();
    assert_eq!(before.pages.total, 256);

    let block = syscall!(k, "malloc", 10_000usize, 1u32).unwrap().block().unwrap();
    let during = k.meminfo().unwrap();
    assert_eq!(during.pages.used, 3);
    assert_eq!(during.pages.used + during.pages.free, during.pages.total);

    k.write_block(block, 4090, b"spans two pages").unwrap();
    assert_eq!(k.read_block(block, 4090, 15).unwrap(), b"spans two pages");

    assert_eq!(syscall!(k, "free", block).unwrap().flag(), Some(true));
    assert_eq!(k.meminfo().unwrap(), before);

    let err = syscall!(k, "free", block).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownBlock);

    let err = syscall!(k, "malloc", 2 * 1024 * 1024usize).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
}

/// Test router rejections
#[test]
fn test_unknown_and_malformed_syscalls() {
    let (_kernel, k) = boot(manual_config());

    assert_eq!(k.syscall("mmap", &[]).unwrap_err().kind(), ErrorKind::UnknownSyscall);
    assert_eq!(syscall!(k, "read").unwrap_err().kind(), ErrorKind::InvalidArgument);

    let listing = syscall!(k, "ls").unwrap();
    let names: Vec<&str> = listing.entries().unwrap().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["bin", "etc", "home", "tmp"]);
}

/// Test one tick moves ready -> running -> ready
#[test]
fn test_tick_runs_one_process() {
    let (_kernel, k) = boot(manual_config());
    let observed = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&observed);
    let pid = k
        .spawn("probe", move |ctx| {
            let me = ctx.kernel().process(ctx.pid())?.map(|p| p.state);
            seen.lock().unwrap().push(me);
            Ok(())
        })
        .unwrap();

    assert_eq!(state_of(&k, pid), ProcessState::Ready);
    match k.tick().unwrap() {
        TickReport::Ran { pid: ran, state, .. } => {
            assert_eq!(ran, pid);
            assert_eq!(state, ProcessState::Ready);
        }
        other => panic!("unexpected tick: {:?}", other),
    }
    assert_eq!(*observed.lock().unwrap(), vec![Some(ProcessState::Running)]);
    assert_eq!(state_of(&k, pid), ProcessState::Ready);
    assert_eq!(k.process(pid).unwrap().unwrap().run_count, 1);
    assert_eq!(k.ready_queue().unwrap(), vec![pid]);
}

/// Test error returns and panics both become termination with -1
#[test]
fn test_faulting_work_is_terminated() {
    let (_kernel, k) = boot(manual_config());

    let failing = k
        .spawn("failing", |_| Err(WorkError::Failed("bad input".into())))
        .unwrap();
    let panicking = k.spawn("panicking", |_| panic!("work bug")).unwrap();
    let healthy = k.spawn("healthy", |_| Ok(())).unwrap();

    for _ in 0..3 {
        k.tick().unwrap();
    }

    for pid in [failing, panicking] {
        let info = k.process(pid).unwrap().unwrap();
        assert_eq!(info.state, ProcessState::Terminated);
        assert_eq!(info.exit_code, Some(-1));
    }
    assert_eq!(state_of(&k, healthy), ProcessState::Ready);
    assert_eq!(k.ready_queue().unwrap(), vec![healthy]);
}

/// Test voluntary exit from inside the work
#[test]
fn test_context_exit() {
    let (_kernel, k) = boot(manual_config());
    let pid = k
        .spawn("once", |ctx| {
            if ctx.run_count() == 1 {
                ctx.exit(5);
            }
            Ok(())
        })
        .unwrap();

    k.tick().unwrap();
    assert_eq!(state_of(&k, pid), ProcessState::Ready);
    k.tick().unwrap();

    let info = k.process(pid).unwrap().unwrap();
    assert_eq!(info.state, ProcessState::Terminated);
    assert_eq!(info.exit_code, Some(5));
    assert_eq!(k.tick().unwrap(), TickReport::Idle);
}

/// Test fork lineage, unknown parents and pid uniqueness
#[test]
fn test_fork_and_exit() {
    let (_kernel, k) = boot(manual_config());
    let parent = k.create_process("worker", 3, |_| Ok(())).unwrap();

    let child = syscall!(k, "fork", parent).unwrap().pid().unwrap();
    let grandchild = k.fork(child).unwrap();
    let info = k.process(grandchild).unwrap().unwrap();
    assert_eq!(info.name, "worker_child_child");
    assert_eq!(info.parent, Some(child));
    assert_eq!(info.priority, 3);

    let pids: Vec<Pid> = k.list_processes().unwrap().iter().map(|p| p.pid).collect();
    let mut unique = pids.clone();
    unique.dedup();
    assert_eq!(pids, unique);

    let err = syscall!(k, "fork", 999u32).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownProcess);

    assert_eq!(syscall!(k, "exit", child, 2).unwrap().flag(), Some(true));
    assert_eq!(syscall!(k, "exit", child).unwrap().flag(), Some(false));
    assert_eq!(syscall!(k, "exit", 999u32).unwrap().flag(), Some(false));
    assert_eq!(syscall!(k, "fork", child).unwrap_err().kind(), ErrorKind::UnknownProcess);

    let ps = syscall!(k, "ps").unwrap();
    let child_info = ps.processes().unwrap().iter().find(|p| p.pid == child).unwrap();
    assert_eq!(child_info.exit_code, Some(2));
}

/// Test terminated records disappear after the grace window
#[test]
fn test_terminated_records_are_reaped() {
    let mut config = manual_config();
    config.scheduler.grace_period_ms = 200;
    let (_kernel, k) = boot(config);

    let pid = k.spawn("short", |_| Ok(())).unwrap();
    k.exit(pid, 0).unwrap();

    k.tick().unwrap();
    assert!(k.process(pid).unwrap().is_some());

    thread::sleep(Duration::from_millis(300));
    k.tick().unwrap();
    assert!(k.process(pid).unwrap().is_none());
}

/// Test reaping does not depend on the scheduler ticking
#[test]
fn test_reaping_without_scheduler() {
    let mut config = manual_config();
    config.scheduler.autostart = true;
    config.scheduler.quantum_ms = 5;
    config.scheduler.grace_period_ms = 50;
    let (mut kernel, k) = boot(config);
    kernel.stop_scheduler();

    let pid = k.spawn("short", |_| Ok(())).unwrap();
    assert!(k.exit(pid, 0).unwrap());
    assert_eq!(state_of(&k, pid), ProcessState::Terminated);

    thread::sleep(Duration::from_millis(300));
    assert!(k.list_processes().unwrap().iter().all(|p| p.pid != pid));
    assert!(k.process(pid).unwrap().is_none());
}

/// Test the priority policy runs lower numbers first
#[test]
fn test_priority_policy_order() {
    let mut config = manual_config();
    config.scheduler.policy = SchedulingPolicy::Priority;
    let (_kernel, k) = boot(config);

    let order = Arc::new(Mutex::new(Vec::new()));
    for (name, priority) in [("low", 5), ("high", 1), ("mid", 3), ("high2", 1)] {
        let order = Arc::clone(&order);
        k.create_process(name, priority, move |ctx| {
            order.lock().unwrap().push(ctx.name().to_string());
            ctx.exit(0);
            Ok(())
        })
        .unwrap();
    }
    while let TickReport::Ran { .. } = k.tick().unwrap() {}

    assert_eq!(*order.lock().unwrap(), vec!["high", "high2", "mid", "low"]);
    assert_eq!(
        k.create_process("zero", 0, |_| Ok(())).unwrap_err().kind(),
        ErrorKind::InvalidPriority
    );
}

/// Test work can issue syscalls and spawn while it runs
#[test]
fn test_work_uses_kernel_handle() {
    let (_kernel, k) = boot(manual_config());

    let pid = k
        .spawn("writer", |ctx| {
            let k = ctx.kernel();
            let path = format!("/tmp/{}.out", ctx.pid());
            let fd = syscall!(k, "open", path.as_str(), "w")?.descriptor().unwrap_or(0);
            syscall!(k, "write", fd, "ran")?;
            syscall!(k, "close", fd)?;
            syscall!(k, "malloc", 64usize, ctx.pid())?;
            k.spawn("helper", |_| Ok(()))?;
            ctx.exit(0);
            Ok(())
        })
        .unwrap();

    assert!(matches!(k.tick().unwrap(), TickReport::Ran { .. }));
    assert_eq!(k.read_file(&format!("/tmp/{}.out", pid)).unwrap(), b"ran");
    assert_eq!(k.meminfo().unwrap().pages.used, 1);
    assert_eq!(k.list_processes().unwrap().len(), 2);
}

/// Test shutdown then boot starts from empty state
#[test]
fn test_reboot_starts_empty() {
    let mut kernel = Kernel::new(manual_config());
    let k = kernel.boot().unwrap();
    k.write_file("/tmp/scratch", b"data").unwrap();
    k.allocate(8192, None).unwrap();
    k.spawn("p", |_| Ok(())).unwrap();
    let fd = syscall!(k, "open", "/tmp/scratch", "r").unwrap().descriptor().unwrap();
    kernel.shutdown();

    assert_eq!(syscall!(k, "ps").unwrap_err().kind(), ErrorKind::NotRunning);

    let k = kernel.boot().unwrap();
    assert!(!k.exists("/tmp/scratch").unwrap());
    assert_eq!(k.meminfo().unwrap().pages.used, 0);
    assert!(k.list_processes().unwrap().is_empty());
    assert_eq!(syscall!(k, "read", fd, 4usize).unwrap_err().kind(), ErrorKind::BadDescriptor);
    assert_eq!(k.spawn("first", |_| Ok(())).unwrap(), 1);
}

/// Test shutdown force-terminates a process mid-step
#[test]
fn test_shutdown_kills_running_process() {
    let (mut kernel, k) = boot(manual_config());
    let (entered_tx, entered_rx) = crossbeam::channel::bounded::<()>(1);
    let (release_tx, release_rx) = crossbeam::channel::bounded::<()>(1);

    let pid = k
        .spawn("long", move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv_timeout(Duration::from_secs(2));
            Ok(())
        })
        .unwrap();

    let stepper = k.clone();
    let step = thread::spawn(move || stepper.tick());
    entered_rx.recv().unwrap();

    kernel.shutdown();
    release_tx.send(()).unwrap();

    let report = step.join().unwrap().unwrap();
    match report {
        TickReport::Ran { pid: ran, state, .. } => {
            assert_eq!(ran, pid);
            assert_eq!(state, ProcessState::Terminated);
        }
        other => panic!("unexpected tick: {:?}", other),
    }
}

/// Test the periodic timer drives processes and stops cleanly
#[test]
fn test_scheduler_timer() {
    let mut config = manual_config();
    config.scheduler.autostart = true;
    config.scheduler.quantum_ms = 5;
    let mut kernel = Kernel::new(config);
    let k = kernel.boot().unwrap();
    assert!(kernel.is_scheduler_running());

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    k.spawn("counter", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while runs.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(runs.load(Ordering::SeqCst) >= 3);

    kernel.stop_scheduler();
    assert!(!kernel.is_scheduler_running());
    let frozen = runs.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(runs.load(Ordering::SeqCst), frozen);

    kernel.start_scheduler().unwrap();
    kernel.shutdown();
}

/// Test stopping the timer lets the step in progress finish
#[test]
fn test_stop_waits_for_running_step() {
    let mut config = manual_config();
    config.scheduler.autostart = true;
    config.scheduler.quantum_ms = 5;
    let mut kernel = Kernel::new(config);
    let k = kernel.boot().unwrap();

    let (entered_tx, entered_rx) = crossbeam::channel::bounded::<()>(1);
    let (release_tx, release_rx) = crossbeam::channel::bounded::<()>(1);
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);

    let pid = k
        .spawn("slow", move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            if ctx.run_count() == 0 {
                let _ = entered_tx.send(());
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            }
            Ok(())
        })
        .unwrap();
    entered_rx.recv().unwrap();

    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
        release_tx.send(()).unwrap();
    });

    kernel.stop_scheduler();
    assert!(released.load(Ordering::SeqCst));
    assert!(!kernel.is_scheduler_running());
    releaser.join().unwrap();

    let info = k.process(pid).unwrap().unwrap();
    assert_eq!(info.state, ProcessState::Ready);
    assert_eq!(info.run_count, 1);
    assert_eq!(k.ready_queue().unwrap(), vec![pid]);

    thread::sleep(Duration::from_millis(30));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(k.process(pid).unwrap().unwrap().run_count, 1);
}

/// Test boot spawns init, which spawns the shell
#[test]
fn test_boot_spawns_init_and_shell() {
    let mut config = manual_config();
    config.scheduler.spawn_init = true;
    let (_kernel, k) = boot(config);

    let ps = k.list_processes().unwrap();
    assert_eq!(ps.len(), 1);
    assert_eq!((ps[0].pid, ps[0].name.as_str()), (1, "init"));

    k.tick().unwrap();
    let shell = k.process(2).unwrap().unwrap();
    assert_eq!(shell.name, "shell");
    assert_eq!(shell.state, ProcessState::Ready);
}

/// Test interrupts [A, B, C] are handled in order while A blocks
#[test]
fn test_interrupts_are_serialized() {
    let (_kernel, k) = boot(manual_config());
    let irq = k.interrupts();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for line in [100, 101, 102] {
        let seen = Arc::clone(&seen);
        irq.register_handler(line, move |i| {
            if i.line == 100 {
                thread::sleep(Duration::from_millis(50));
            }
            seen.lock().unwrap().push(i.line);
            Ok(())
        });
    }

    assert!(irq.trigger(100, None));
    assert!(irq.trigger(101, None));
    assert!(irq.trigger(102, None));
    irq.wait_idle();

    assert_eq!(*seen.lock().unwrap(), vec![100, 101, 102]);
}

/// Test the router raises the syscall line with the name as payload
#[test]
fn test_syscalls_raise_interrupts() {
    let (_kernel, k) = boot(manual_config());
    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&names);
    k.interrupts().register_handler(SYSCALL, move |i| {
        let name = String::from_utf8_lossy(i.payload.as_deref().unwrap_or_default()).into_owned();
        sink.lock().unwrap().push(name);
        Ok(())
    });

    syscall!(k, "meminfo").unwrap();
    syscall!(k, "ps").unwrap();
    k.interrupts().wait_idle();

    assert_eq!(*names.lock().unwrap(), vec!["meminfo", "ps"]);
}

/// Test interrupts are rejected once the kernel is down
#[test]
fn test_interrupts_disabled_after_shutdown() {
    let (mut kernel, k) = boot(manual_config());
    assert!(k.interrupts().is_enabled());
    kernel.shutdown();
    assert!(!k.interrupts().trigger(1, None));
}
