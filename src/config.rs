//! Configuration types for selinux-relabel
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Validated walk and relabel configuration
//! - Filesystem roots for the SELinux handle

use crate::error::ConfigError;
use crate::label::Context;
use crate::selinux::{SelinuxConfig, DEFAULT_CONFIG_DIR, DEFAULT_PROC_ROOT};
use crate::walker::default_concurrency;
use clap::Parser;
use std::path::PathBuf;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 1024;

/// Parallel SELinux file relabeling
#[derive(Parser, Debug, Clone)]
#[command(
    name = "selinux-relabel",
    version,
    about = "Parallel SELinux file relabeling",
    long_about = "Sets SELinux file labels, optionally across whole directory trees.\n\n\
                  Trees are listed by a single reader thread and labeled by a pool of\n\
                  workers; the first failure stops the walk.",
    after_help = "EXAMPLES:\n    \
        selinux-relabel chcon /srv/data system_u:object_r:container_file_t:s0 -R\n    \
        selinux-relabel relabel /var/lib/vol system_u:object_r:container_file_t:s0:c1,c2 --shared\n    \
        selinux-relabel getfilecon /srv/data\n    \
        selinux-relabel count /home/user -w 32\n    \
        selinux-relabel status"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// SELinux configuration directory
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_DIR, value_name = "DIR")]
    pub config_dir: PathBuf,

    /// procfs mount point
    #[arg(long, global = true, default_value = DEFAULT_PROC_ROOT, value_name = "DIR", hide = true)]
    pub proc_root: PathBuf,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Set the SELinux label of a file or tree
    Chcon {
        /// File or directory to label
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Full context, e.g. system_u:object_r:container_file_t:s0
        #[arg(value_name = "LABEL")]
        label: String,

        /// Label everything below PATH too
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Number of labeling threads
        #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
        workers: usize,
    },

    /// Relabel a tree for container use (refuses system directories)
    Relabel {
        /// Directory to relabel
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Full context to apply
        #[arg(value_name = "LABEL")]
        label: String,

        /// Make the content usable by every container (level s0)
        #[arg(long)]
        shared: bool,

        /// Number of labeling threads
        #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
        workers: usize,
    },

    /// Print the SELinux label of a file
    Getfilecon {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Walk a tree and report counts and sizes
    Count {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Number of walker threads
        #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
        workers: usize,
    },

    /// Show SELinux state of this system
    Status,
}

fn default_workers() -> usize {
    default_concurrency()
}

impl CliArgs {
    /// Filesystem roots for the SELinux handle
    pub fn selinux_config(&self) -> SelinuxConfig {
        SelinuxConfig {
            config_dir: self.config_dir.clone(),
            proc_root: self.proc_root.clone(),
            selinuxfs: None,
        }
    }
}

/// Validated configuration for commands that walk a tree
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Root of the walk
    pub root: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let (root, workers) = match &args.command {
            Command::Chcon { path, workers, .. }
            | Command::Relabel { path, workers, .. }
            | Command::Count { path, workers } => (path, *workers),
            Command::Getfilecon { path } => (path, 1),
            Command::Status => {
                return Err(ConfigError::InvalidPath {
                    path: PathBuf::new(),
                    reason: "command does not take a path".to_string(),
                })
            }
        };

        if root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidPath {
                path: root.clone(),
                reason: "path must not be empty".to_string(),
            });
        }

        // Validate worker count
        if workers == 0 || workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: workers,
                max: MAX_WORKERS,
            });
        }

        Ok(Self {
            root: root.clone(),
            worker_count: workers,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

/// Validated configuration for `chcon` and `relabel`
#[derive(Debug, Clone)]
pub struct RelabelConfig {
    pub walk: WalkConfig,

    /// Label to apply
    pub label: String,

    /// Label below the root too
    pub recursive: bool,

    /// Reset the level to s0
    pub shared: bool,

    /// Refuse system directories
    pub guarded: bool,
}

impl RelabelConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let walk = WalkConfig::from_args(args)?;

        let (label, recursive, shared, guarded) = match &args.command {
            Command::Chcon {
                label, recursive, ..
            } => (label, *recursive, false, false),
            Command::Relabel { label, shared, .. } => (label, true, *shared, true),
            _ => {
                return Err(ConfigError::InvalidLabel {
                    label: String::new(),
                    reason: "command does not take a label".to_string(),
                })
            }
        };

        Context::parse(label).map_err(|e| ConfigError::InvalidLabel {
            label: label.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            walk,
            label: label.clone(),
            recursive,
            shared,
            guarded,
        })
    }
}
