//! File labels stored in the `security.selinux` extended attribute
//!
//! Both calls operate on the link itself, never its target.

use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Extended attribute holding a file's SELinux context
pub const XATTR_NAME: &str = "security.selinux";

const XATTR_NAME_C: &CStr = c"security.selinux";

/// Initial read buffer; grown on ERANGE
const INITIAL_BUF_SIZE: usize = 256;

fn c_path(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))
}

/// Retry a libc call while it fails with EINTR
fn retry_eintr<F>(mut call: F) -> io::Result<isize>
where
    F: FnMut() -> isize,
{
    loop {
        let ret = call();
        if ret >= 0 {
            return Ok(ret);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EINTR) {
            return Err(err);
        }
    }
}

/// Read the SELinux label of `path` without following symlinks
pub fn file_label(path: &Path) -> io::Result<String> {
    let cpath = c_path(path)?;
    let name = XATTR_NAME_C;
    let mut buf = vec![0u8; INITIAL_BUF_SIZE];

    loop {
        let result = retry_eintr(|| unsafe {
            libc::lgetxattr(
                cpath.as_ptr(),
                name.as_ptr(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        });

        match result {
            Ok(len) => {
                buf.truncate(len as usize);
                break;
            }
            Err(e) if e.raw_os_error() == Some(libc::ERANGE) => {
                // Ask the kernel for the exact size, then try again
                let size = retry_eintr(|| unsafe {
                    libc::lgetxattr(cpath.as_ptr(), name.as_ptr(), std::ptr::null_mut(), 0)
                })?;
                buf = vec![0u8; (size as usize).max(buf.len() * 2)];
            }
            Err(e) => return Err(e),
        }
    }

    if buf.last() == Some(&0) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Set the SELinux label of `path` without following symlinks
pub fn set_file_label(path: &Path, label: &str) -> io::Result<()> {
    let cpath = c_path(path)?;
    let name = XATTR_NAME_C;
    let value = label.as_bytes();

    retry_eintr(|| unsafe {
        libc::lsetxattr(
            cpath.as_ptr(),
            name.as_ptr(),
            value.as_ptr().cast::<libc::c_void>(),
            value.len(),
            0,
        ) as isize
    })?;
    Ok(())
}
