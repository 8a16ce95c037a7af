//! Directory entry metadata handed to visitors
//!
//! Built from `std::fs::DirEntry` during listing (no extra stat on Linux,
//! the type comes from `d_type`) or from `symlink_metadata` for the root.

use std::ffi::{OsStr, OsString};
use std::fs::{self, FileType, Metadata};
use std::os::unix::fs::{DirEntryExt, FileTypeExt, MetadataExt};

/// Type of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryType {
    /// Regular file
    File = 0,
    /// Directory
    Directory = 1,
    /// Symbolic link
    Symlink = 2,
    /// Block device
    BlockDevice = 3,
    /// Character device
    CharDevice = 4,
    /// Named pipe (FIFO)
    Fifo = 5,
    /// Unix socket
    Socket = 6,
    /// Unknown type
    Unknown = 255,
}

impl EntryType {
    /// Convert from a std file type (never follows symlinks)
    pub fn from_file_type(ft: FileType) -> Self {
        if ft.is_symlink() {
            EntryType::Symlink
        } else if ft.is_dir() {
            EntryType::Directory
        } else if ft.is_file() {
            EntryType::File
        } else if ft.is_block_device() {
            EntryType::BlockDevice
        } else if ft.is_char_device() {
            EntryType::CharDevice
        } else if ft.is_fifo() {
            EntryType::Fifo
        } else if ft.is_socket() {
            EntryType::Socket
        } else {
            EntryType::Unknown
        }
    }

    /// Convert from mode bits
    pub fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            0o100000 => EntryType::File,
            0o040000 => EntryType::Directory,
            0o120000 => EntryType::Symlink,
            0o060000 => EntryType::BlockDevice,
            0o020000 => EntryType::CharDevice,
            0o010000 => EntryType::Fifo,
            0o140000 => EntryType::Socket,
            _ => EntryType::Unknown,
        }
    }

    /// Check if this is a regular file
    pub fn is_file(&self) -> bool {
        *self == EntryType::File
    }

    /// Check if this is a directory
    pub fn is_dir(&self) -> bool {
        *self == EntryType::Directory
    }

    /// Check if this is a symbolic link
    pub fn is_symlink(&self) -> bool {
        *self == EntryType::Symlink
    }
}

/// Metadata for one visited filesystem object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: OsString,
    entry_type: EntryType,
    inode: Option<u64>,
    depth: u32,
}

impl Entry {
    /// Build the root entry from lstat metadata
    pub(crate) fn root(name: &OsStr, meta: &Metadata) -> Self {
        Self {
            name: name.to_os_string(),
            entry_type: EntryType::from_mode(meta.mode()),
            inode: Some(meta.ino()),
            depth: 0,
        }
    }

    /// Build from a listing entry whose type was already resolved
    pub(crate) fn from_dir_entry(de: &fs::DirEntry, entry_type: EntryType, depth: u32) -> Self {
        Self {
            name: de.file_name(),
            entry_type,
            inode: Some(de.ino()),
            depth,
        }
    }

    /// Placeholder for an object whose metadata could not be read
    pub(crate) fn partial(name: &OsStr, entry_type: EntryType, depth: u32) -> Self {
        Self {
            name: name.to_os_string(),
            entry_type,
            inode: None,
            depth,
        }
    }

    /// Final path component
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    /// Entry type, as reported by the directory listing
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    /// Inode number, when the listing provided one
    pub fn inode(&self) -> Option<u64> {
        self.inode
    }

    /// Depth below the walk root (root = 0)
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Shorthand for `entry_type().is_dir()`
    pub fn is_dir(&self) -> bool {
        self.entry_type.is_dir()
    }
}
