//! `key=value` configuration files (`/etc/selinux/config`, `lxc_contexts`)

use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

/// One assignment per line, `#` and `;` start comments
static ASSIGN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^=]+)=(.*)$").expect("Invalid assignment regex"));

/// Parse every `key=value` pair in `contents`, in file order.
///
/// Keys and values are trimmed and values lose one layer of surrounding
/// double quotes. Lines that are not assignments are ignored.
pub fn parse_assignments(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| {
            let caps = ASSIGN_REGEX.captures(line)?;
            let key = caps[1].trim().to_string();
            let value = strip_quotes(caps[2].trim()).to_string();
            Some((key, value))
        })
        .collect()
}

/// Read and parse an assignment file
pub fn read_assignments(path: &Path) -> io::Result<Vec<(String, String)>> {
    Ok(parse_assignments(&fs::read_to_string(path)?))
}

/// First value for `key` in the file at `path`; missing files read as empty
pub fn lookup(path: &Path, key: &str) -> Option<String> {
    read_assignments(path)
        .ok()?
        .into_iter()
        .find_map(|(k, v)| (k == key).then_some(v))
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
