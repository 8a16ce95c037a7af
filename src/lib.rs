//! selinux-relabel - Parallel SELinux File Relabeling
//!
//! Library support for managing SELinux file and process labels, built
//! around a bounded-concurrency directory walker that makes recursive
//! relabeling of large trees fast.
//!
//! # Features
//!
//! - **Parallel Walker**: One thread lists directories depth-first while a
//!   pool of workers runs the visitor; memory stays bounded by a small work
//!   queue no matter how wide or deep the tree is.
//!
//! - **Fail Fast**: The first visitor error stops the walk and is returned
//!   as the walk's only result. Root errors are reported before any thread
//!   starts.
//!
//! - **Label Management**: Context parsing, container label options, MCS
//!   level allocation, process attributes and file xattrs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │   relabel    │──►│      walker      │──►│  selinux::xattr      │
//! │ chcon/guard  │   │ producer+workers │   │  lsetxattr per path  │
//! └──────┬───────┘   └──────────────────┘   └──────────────────────┘
//!        │
//! ┌──────▼───────┐   ┌──────────────────┐
//! │   selinux    │──►│      label       │
//! │ Selinux hdl  │   │ Context, McsPool │
//! └──────────────┘   └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use selinux_relabel::walker::{walk, Entry, Visit};
//! use std::io;
//! use std::path::Path;
//!
//! let result = walk("/srv/data", |path: &Path, _: Option<&Entry>, err: Option<&io::Error>| {
//!     match err {
//!         Some(_) => Visit::Continue,
//!         None => {
//!             println!("{}", path.display());
//!             Visit::Continue
//!         }
//!     }
//! });
//! assert!(result.is_ok());
//! ```

pub mod config;
pub mod error;
pub mod label;
pub mod progress;
pub mod relabel;
pub mod selinux;
pub mod walker;

pub use config::{CliArgs, RelabelConfig, WalkConfig};
pub use error::{Error, LabelError, Result, WalkError};
pub use label::{Context, McsPool};
pub use relabel::{chcon, FileLabeler, XattrLabeler};
pub use selinux::{Selinux, SelinuxConfig};
pub use walker::{walk, walk_n, Entry, EntryType, Visit, Visitor};
