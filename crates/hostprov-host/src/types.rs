//! Type definitions for host state queries

use serde::{Deserialize, Serialize};

/// Runtime and boot state of a system service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Currently running
    pub active: bool,
    /// Started at boot
    pub enabled: bool,
}

/// Kind of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::File => write!(f, "file"),
            FileKind::Directory => write!(f, "directory"),
            FileKind::Symlink => write!(f, "symlink"),
            FileKind::Other => write!(f, "other"),
        }
    }
}

/// Metadata of a path on the target host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Entry kind
    pub kind: FileKind,
    /// Permission bits, e.g. `0o640`
    pub mode: u32,
    /// Owning user name
    pub owner: String,
    /// Owning group name
    pub group: String,
}

impl FileStat {
    /// Whether owner, group and mode match the requested values.
    ///
    /// `None` means "don't care".
    #[must_use]
    pub fn matches(&self, owner: Option<&str>, group: Option<&str>, mode: Option<u32>) -> bool {
        owner.is_none_or(|o| o == self.owner)
            && group.is_none_or(|g| g == self.group)
            && mode.is_none_or(|m| m == self.mode)
    }
}
