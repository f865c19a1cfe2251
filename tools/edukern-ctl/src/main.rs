//! edukern - boot driver for the EduKern kernel
//!
//! Commands:
//! - `edukern boot` - Boot, let the scheduler run, report and shut down
//! - `edukern run <program> [args]` - Boot and run one command program
//! - `edukern programs` - List command programs

mod programs;

use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use edukern_kernel::{Completion, Kernel, KernelConfig, KernelHandle};

#[derive(Parser)]
#[command(name = "edukern")]
#[command(author = "EduKern Contributors")]
#[command(version)]
#[command(about = "EduKern - in-memory teaching kernel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the kernel, run the scheduler for a while, print state
    Boot {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host overlay, HOST:VIRTUAL (repeatable)
        #[arg(short, long = "sync", value_name = "HOST:VIRTUAL")]
        sync: Vec<String>,

        /// How long to let the scheduler run, in milliseconds
        #[arg(long, default_value_t = 500)]
        run_for: u64,
    },

    /// Boot the kernel and run one command program
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host overlay, HOST:VIRTUAL (repeatable)
        #[arg(short, long = "sync", value_name = "HOST:VIRTUAL")]
        sync: Vec<String>,

        /// Working directory for relative paths
        #[arg(long, default_value = "/")]
        cwd: String,

        /// Program name (see `edukern programs`)
        program: String,

        /// Program arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// List command programs
    Programs,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Boot {
            config,
            sync,
            run_for,
        } => {
            let config = load_config(config.as_deref(), sync)?;
            boot(config, Duration::from_millis(run_for))?;
        }

        Commands::Run {
            config,
            sync,
            cwd,
            program,
            args,
        } => {
            let config = load_config(config.as_deref(), sync)?;
            let code = run_program(config, &program, &args, &cwd)?;
            if code != 0 {
                std::process::exit(code);
            }
        }

        Commands::Programs => {
            show_programs();
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, sync: Vec<String>) -> anyhow::Result<KernelConfig> {
    let mut config = match path {
        Some(path) => KernelConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => KernelConfig::default(),
    };
    config.fs.overlays.extend(sync);
    Ok(config)
}

fn boot(config: KernelConfig, run_for: Duration) -> anyhow::Result<()> {
    println!("{} Booting EduKern...", "🚀".green());
    let mut kernel = Kernel::new(config);
    let k = kernel.boot().context("Boot failed")?;

    thread::sleep(run_for);
    report(&k)?;

    kernel.shutdown();
    println!("{} Halted", "✅".green());
    Ok(())
}

fn report(k: &KernelHandle) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();

    println!("\n{}", "Processes".bold());
    if let Some(ps) = programs::find("ps") {
        ps.run(k, &[], "/", &mut out)?;
    }

    println!("\n{}", "Memory".bold());
    if let Some(meminfo) = programs::find("meminfo") {
        meminfo.run(k, &[], "/", &mut out)?;
    }

    let stats = k.interrupts().stats();
    println!(
        "\n{} delivered {}, dropped {}, faulted {}",
        "Interrupts".bold(),
        stats.delivered,
        stats.dropped,
        stats.faulted
    );
    Ok(())
}

fn run_program(config: KernelConfig, name: &str, args: &[String], cwd: &str) -> anyhow::Result<i32> {
    let Some(program) = programs::find(name) else {
        anyhow::bail!("Unknown program '{}' (try `edukern programs`)", name);
    };

    let mut kernel = Kernel::new(config);
    let k = kernel.boot().context("Boot failed")?;

    let result = program.run(&k, args, cwd, &mut io::stdout().lock());
    kernel.shutdown();

    match result {
        Ok(Completion::Exit(code)) => Ok(code),
        Ok(Completion::Suspend) => {
            println!("{} {} suspended", "⏸".yellow(), name);
            Ok(0)
        }
        Err(err) => {
            eprintln!("{} {}: {}", "✗".red(), name, err);
            Ok(1)
        }
    }
}

fn show_programs() {
    println!("{}", "EduKern programs".bold().green());
    for program in programs::registry() {
        println!("  {:<10} {}", program.name(), program.description());
    }
}
