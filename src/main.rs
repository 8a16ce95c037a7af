//! selinux-relabel - parallel SELinux file relabeling
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use selinux_relabel::config::{CliArgs, Command, RelabelConfig, WalkConfig};
use selinux_relabel::progress::{print_header, print_summary, ProgressReporter, WalkProgress};
use selinux_relabel::relabel::{chcon, relabel, FileLabeler, XattrLabeler};
use selinux_relabel::selinux::{file_label, Selinux};
use selinux_relabel::walker::{walk_n, Entry, Visit};
use std::fs;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Progress refresh period
const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Setup signal handler for graceful shutdown
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    match &args.command {
        Command::Chcon { .. } | Command::Relabel { .. } => run_relabel(&args, &interrupted),
        Command::Count { .. } => run_count(&args, &interrupted),
        Command::Getfilecon { path } => {
            let label = file_label(path)
                .with_context(|| format!("Failed to read label of '{}'", path.display()))?;
            println!("{}\t{}", path.display(), label);
            Ok(())
        }
        Command::Status => run_status(&args),
    }
}

/// Error a visitor returns once Ctrl-C was pressed
fn interrupted_error() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "interrupted by signal")
}

/// Xattr labeler that counts its work and honors Ctrl-C
struct CliLabeler<'a> {
    progress: &'a WalkProgress,
    interrupted: &'a AtomicBool,
}

impl FileLabeler for CliLabeler<'_> {
    fn file_label(&self, path: &Path) -> io::Result<String> {
        XattrLabeler.file_label(path)
    }

    fn set_file_label(&self, path: &Path, label: &str) -> io::Result<()> {
        if self.interrupted.load(Ordering::Relaxed) {
            return Err(interrupted_error());
        }
        match XattrLabeler.set_file_label(path, label) {
            Ok(()) => {
                self.progress.labeled.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.progress.errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

fn run_relabel(args: &CliArgs, interrupted: &AtomicBool) -> Result<()> {
    let config = RelabelConfig::from_args(args).context("Invalid configuration")?;
    let walk = &config.walk;

    if config.guarded {
        let se = Selinux::new(args.selinux_config());
        if !se.is_enabled() {
            warn!("SELinux is disabled, nothing to relabel");
            return Ok(());
        }
    }

    if walk.show_progress && config.recursive {
        print_header(
            if config.guarded { "relabel" } else { "chcon" },
            &walk.root.display().to_string(),
            walk.worker_count,
        );
    }

    let progress = WalkProgress::new();
    let labeler = CliLabeler {
        progress: &progress,
        interrupted,
    };

    let result = with_progress(walk.show_progress && config.recursive, &progress, || {
        if config.guarded {
            relabel(
                &labeler,
                &walk.root,
                &config.label,
                config.shared,
                walk.worker_count,
            )
        } else {
            chcon(
                &labeler,
                &walk.root,
                &config.label,
                config.recursive,
                walk.worker_count,
            )
        }
    });

    let completed = result.is_ok();
    if walk.show_progress && config.recursive {
        let title = if completed {
            "Relabel Complete"
        } else {
            "Relabel Stopped"
        };
        print_summary(title, &progress, completed);
    }

    result.with_context(|| format!("Failed to relabel '{}'", walk.root.display()))?;
    info!(
        labeled = progress.labeled.load(Ordering::Relaxed),
        root = %walk.root.display(),
        "Relabel finished"
    );
    Ok(())
}

fn run_count(args: &CliArgs, interrupted: &AtomicBool) -> Result<()> {
    let config = WalkConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            "count",
            &config.root.display().to_string(),
            config.worker_count,
        );
    }

    let progress = WalkProgress::new();
    let visitor = |path: &Path, entry: Option<&Entry>, err: Option<&io::Error>| {
        if interrupted.load(Ordering::Relaxed) {
            return Visit::abort(interrupted_error());
        }
        if let Some(e) = err {
            debug!(path = %path.display(), error = %e, "Unreadable entry");
            progress.errors.fetch_add(1, Ordering::Relaxed);
            return Visit::Continue;
        }

        match entry {
            Some(e) if e.is_dir() => {
                progress.dirs.fetch_add(1, Ordering::Relaxed);
            }
            Some(e) if e.entry_type().is_symlink() => {
                progress.symlinks.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                progress.files.fetch_add(1, Ordering::Relaxed);
                match fs::symlink_metadata(path) {
                    Ok(meta) => {
                        progress.bytes.fetch_add(meta.len(), Ordering::Relaxed);
                    }
                    // Removed since it was listed
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(_) => {
                        progress.errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
        Visit::Continue
    };

    let result = with_progress(config.show_progress, &progress, || {
        walk_n(&config.root, visitor, config.worker_count)
    });

    let completed = result.is_ok();
    if config.show_progress {
        let title = if completed { "Walk Complete" } else { "Walk Stopped" };
        print_summary(title, &progress, completed);
    } else {
        println!(
            "{}\t{}\t{}\t{}",
            progress.dirs.load(Ordering::Relaxed),
            progress.files.load(Ordering::Relaxed),
            progress.symlinks.load(Ordering::Relaxed),
            progress.bytes.load(Ordering::Relaxed)
        );
    }

    result.with_context(|| format!("Walk of '{}' failed", config.root.display()))?;
    Ok(())
}

fn run_status(args: &CliArgs) -> Result<()> {
    let se = Selinux::new(args.selinux_config());

    let enabled = se.is_enabled();
    println!("SELinux status:        {}", if enabled { "enabled" } else { "disabled" });
    if let Some(mount) = se.selinuxfs() {
        println!("SELinuxfs mount:       {}", mount.display());
    }
    println!("Policy root:           {}", se.policy_root().display());
    println!("Current mode:          {}", se.enforce_mode());
    println!("Mode from config file: {}", se.default_enforce_mode());
    if enabled {
        match se.current_label() {
            Ok(label) => println!("Process context:       {}", label),
            Err(e) => debug!(error = %e, "Cannot read process context"),
        }
    }
    Ok(())
}

/// Run `work` while a background thread refreshes a spinner
fn with_progress<T, F>(show: bool, progress: &WalkProgress, work: F) -> T
where
    F: FnOnce() -> T,
{
    if !show {
        return work();
    }

    let reporter = ProgressReporter::new();
    reporter.set_status("Walking...");
    let done = AtomicBool::new(false);

    let result = thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Relaxed) {
                reporter.update(progress);
                thread::sleep(PROGRESS_INTERVAL);
            }
        });
        let result = work();
        done.store(true, Ordering::Relaxed);
        result
    });

    reporter.finish_and_clear();
    result
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("selinux_relabel=debug,warn")
    } else {
        EnvFilter::new("selinux_relabel=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(io::stderr)
        .init();

    Ok(())
}
