//! File commands built on coreutils
//!
//! Contents travel base64-encoded inside the command line so that writes
//! need nothing beyond the executor's single command channel.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hostprov_exec::{CommandResult, quote};

use crate::error::HostError;
use crate::types::{FileKind, FileStat};

const STAT_FORMAT: &str = "%F|%a|%U|%G";

/// Exit status of `stat_cmd`/`read_cmd` when the path does not exist
pub(crate) const MISSING_STATUS: i32 = 44;

/// Exit with `MISSING_STATUS` unless `path` exists (dangling links count)
fn require_exists(path: &str) -> String {
    let target = quote(path);
    format!("{{ [ -e {target} ] || [ -L {target} ]; }} || exit {MISSING_STATUS}")
}

pub(crate) fn stat_cmd(path: &str) -> String {
    format!(
        "{}; stat -c {} -- {}",
        require_exists(path),
        quote(STAT_FORMAT),
        quote(path)
    )
}

pub(crate) fn read_cmd(path: &str) -> String {
    format!("{}; cat -- {}", require_exists(path), quote(path))
}

/// Write `contents` to `path`.
///
/// With a mode, the data goes to a sibling temp file that is chmod'ed and
/// renamed over `path`, so readers never see a half-written file. Without
/// one, the file is truncated and rewritten in place, which keeps the mode
/// and ownership of an existing file.
pub(crate) fn write_cmd(path: &str, contents: &str, mode: Option<u32>) -> String {
    let encoded = STANDARD.encode(contents.as_bytes());
    let target = quote(path);

    match mode {
        Some(mode) => {
            let tmp = quote(&format!("{path}.hostprov.tmp"));
            format!(
                "printf '%s' {encoded} | base64 -d > {tmp} && chmod {mode:o} {tmp} && mv -f {tmp} {target}"
            )
        }
        None => format!("printf '%s' {encoded} | base64 -d > {target}"),
    }
}

pub(crate) fn remove_cmd(path: &str) -> String {
    format!("rm -rf -- {}", quote(path))
}

pub(crate) fn mkdir_cmd(path: &str) -> String {
    format!("mkdir -p -- {}", quote(path))
}

pub(crate) fn attributes_cmd(
    path: &str,
    owner: Option<&str>,
    group: Option<&str>,
    mode: Option<u32>,
) -> Option<String> {
    let mut parts = Vec::new();
    let target = quote(path);

    match (owner, group) {
        (Some(o), Some(g)) => parts.push(format!("chown {}:{} -- {target}", quote(o), quote(g))),
        (Some(o), None) => parts.push(format!("chown {} -- {target}", quote(o))),
        (None, Some(g)) => parts.push(format!("chgrp {} -- {target}", quote(g))),
        (None, None) => {}
    }
    if let Some(mode) = mode {
        parts.push(format!("chmod {mode:o} -- {target}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" && "))
    }
}

/// Whether `stat_cmd`/`read_cmd` found no such path.
///
/// Decided by exit status, so it holds whatever locale the host runs in.
pub(crate) fn is_missing(result: &CommandResult) -> bool {
    result.status == MISSING_STATUS
}

/// Parse one line of `stat -c '%F|%a|%U|%G'`
pub(crate) fn parse_stat(output: &str) -> Result<FileStat, HostError> {
    let line = output.trim();
    let fields: Vec<&str> = line.split('|').collect();
    let [kind, mode, owner, group] = fields.as_slice() else {
        return Err(HostError::Parse(format!("unexpected stat output: {line}")));
    };

    let kind = match *kind {
        "regular file" | "regular empty file" => FileKind::File,
        "directory" => FileKind::Directory,
        "symbolic link" => FileKind::Symlink,
        _ => FileKind::Other,
    };
    let mode = u32::from_str_radix(mode, 8)
        .map_err(|e| HostError::Parse(format!("bad mode {mode:?}: {e}")))?;

    Ok(FileStat {
        kind,
        mode,
        owner: (*owner).to_string(),
        group: (*group).to_string(),
    })
}
