//! Action model: what a provisioning step does and when it runs

use std::collections::{BTreeMap, BTreeSet};

use hostprov_exec::CommandResult;
use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;

/// One ordered provisioning step
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub tags: BTreeSet<String>,
    /// Evaluated against earlier registered results; `None` always runs
    pub guard: Option<Guard>,
    pub effect: Effect,
    /// Record a failure and keep going instead of halting the run
    pub ignore_errors: bool,
    /// Store this action's result under the given name
    pub register: Option<String>,
}

impl Action {
    /// Create an untagged, unguarded action
    pub fn new(name: impl Into<String>, effect: Effect) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            guard: None,
            effect,
            ignore_errors: false,
            register: None,
        }
    }

    /// Add tags
    #[must_use]
    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags.extend(tags.iter().map(|t| (*t).to_string()));
        self
    }

    /// Only run when `guard` holds
    #[must_use]
    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Keep going if this action fails
    #[must_use]
    pub fn ignore_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    /// Register the result under `name`
    #[must_use]
    pub fn register(mut self, name: impl Into<String>) -> Self {
        self.register = Some(name.into());
        self
    }
}

/// Result of an earlier action, kept for guards and templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registered {
    pub failed: bool,
    pub changed: bool,
    pub skipped: bool,
    /// Exit status for shell effects
    pub rc: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Registered {
    pub(crate) fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Precondition over registered results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The named action ran and failed
    Failed(String),
    /// The named action ran and succeeded
    Succeeded(String),
}

impl Guard {
    /// Evaluate against the registry; a missing or skipped entry never holds
    #[must_use]
    pub fn holds(&self, registry: &BTreeMap<String, Registered>) -> bool {
        match self {
            Guard::Failed(name) => registry.get(name).is_some_and(|r| !r.skipped && r.failed),
            Guard::Succeeded(name) => registry.get(name).is_some_and(|r| !r.skipped && !r.failed),
        }
    }
}

impl std::fmt::Display for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Guard::Failed(name) => write!(f, "{name} is failed"),
            Guard::Succeeded(name) => write!(f, "{name} is succeeded"),
        }
    }
}

/// How a shell effect decides whether it changed the host.
///
/// Shell commands cannot observe their own effect, so each one carries a
/// heuristic. `NonZeroExit` reports a change only when the command exits
/// non-zero, which for a command that must exit zero to succeed means it
/// never reports a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRule {
    Always,
    Never,
    NonZeroExit,
    /// Changed unless stdout or stderr contains the text
    OutputLacks(String),
    /// Changed if stdout or stderr contains the text
    OutputContains(String),
}

impl ChangeRule {
    /// Classify a finished command
    #[must_use]
    pub fn changed(&self, result: &CommandResult) -> bool {
        match self {
            ChangeRule::Always => true,
            ChangeRule::Never => false,
            ChangeRule::NonZeroExit => !result.success(),
            ChangeRule::OutputLacks(text) => !result.output_contains(text),
            ChangeRule::OutputContains(text) => result.output_contains(text),
        }
    }
}

/// The host mutation an action converges towards
#[derive(Debug, Clone)]
pub enum Effect {
    /// Static hostname equals `name`
    Hostname { name: String },
    /// Every listed OS package is installed
    Packages { names: Vec<String> },
    /// Service state, optionally reloading unit files first
    Service {
        name: String,
        started: bool,
        enabled: bool,
        daemon_reload: bool,
    },
    /// Firewall lets a named service through
    FirewallService {
        service: String,
        permanent: bool,
        immediate: bool,
    },
    /// `dest` exists, fetched from `url` if it did not
    Download {
        url: String,
        dest: String,
        mode: Option<u32>,
    },
    /// Raw shell command
    Shell {
        command: String,
        chdir: Option<String>,
        changed: ChangeRule,
    },
    /// `path` does not exist
    Absent { path: String },
    /// `dest` holds a checkout, cloned if it did not exist
    GitClone {
        repo: String,
        dest: String,
        version: String,
        single_branch: bool,
    },
    /// `path` is a directory with the given attributes
    Directory {
        path: String,
        owner: Option<String>,
        group: Option<String>,
        mode: Option<u32>,
    },
    /// `dest` is seeded from `src` on the host; an existing `dest` keeps
    /// its contents and only has its mode corrected
    Copy {
        src: String,
        dest: String,
        mode: Option<u32>,
    },
    /// The last line matching `regexp` reads `line`
    LineInFile {
        path: String,
        regexp: Regex,
        line: String,
    },
    /// `dest` holds `source` rendered with `vars` plus the trimmed stdout of
    /// registered results (template variable → register name)
    Template {
        source: String,
        dest: String,
        mode: Option<u32>,
        vars: BTreeMap<String, String>,
        registered_vars: BTreeMap<String, String>,
    },
}

impl Effect {
    /// Line edit with the pattern compiled up front
    ///
    /// # Errors
    /// Returns `CoreError::Pattern` if `regexp` does not compile
    pub fn line_in_file(
        path: impl Into<String>,
        regexp: &str,
        line: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let regexp = Regex::new(regexp).map_err(|e| CoreError::Pattern {
            pattern: regexp.to_string(),
            message: e.to_string(),
        })?;
        Ok(Effect::LineInFile {
            path: path.into(),
            regexp,
            line: line.into(),
        })
    }

    /// Short module-like name used in listings and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Hostname { .. } => "hostname",
            Effect::Packages { .. } => "packages",
            Effect::Service { .. } => "service",
            Effect::FirewallService { .. } => "firewall",
            Effect::Download { .. } => "download",
            Effect::Shell { .. } => "shell",
            Effect::Absent { .. } => "absent",
            Effect::GitClone { .. } => "git",
            Effect::Directory { .. } => "directory",
            Effect::Copy { .. } => "copy",
            Effect::LineInFile { .. } => "lineinfile",
            Effect::Template { .. } => "template",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_on_missing_register() {
        let registry = BTreeMap::new();
        assert!(!Guard::Failed("probe".to_string()).holds(&registry));
        assert!(!Guard::Succeeded("probe".to_string()).holds(&registry));
    }

    #[test]
    fn test_guard_on_failed_register() {
        let mut registry = BTreeMap::new();
        registry.insert(
            "probe".to_string(),
            Registered {
                failed: true,
                rc: Some(127),
                ..Registered::default()
            },
        );

        assert!(Guard::Failed("probe".to_string()).holds(&registry));
        assert!(!Guard::Succeeded("probe".to_string()).holds(&registry));
    }

    #[test]
    fn test_guard_on_skipped_register() {
        let mut registry = BTreeMap::new();
        registry.insert("probe".to_string(), Registered::skipped());

        assert!(!Guard::Failed("probe".to_string()).holds(&registry));
        assert!(!Guard::Succeeded("probe".to_string()).holds(&registry));
    }

    #[test]
    fn test_nonzero_exit_rule_is_inverted() {
        let ok = CommandResult::ok("done");
        let failed = CommandResult::failed(1, "boom");

        assert!(!ChangeRule::NonZeroExit.changed(&ok));
        assert!(ChangeRule::NonZeroExit.changed(&failed));
    }

    #[test]
    fn test_output_rules() {
        let installed = CommandResult::ok("v22.11.0 is already installed.\nNow using node v22.11.0");
        let fresh = CommandResult::ok("Downloading and installing node v22.11.0...");

        let rule = ChangeRule::OutputLacks("is already installed".to_string());
        assert!(!rule.changed(&installed));
        assert!(rule.changed(&fresh));

        let rule = ChangeRule::OutputContains("Downloading".to_string());
        assert!(rule.changed(&fresh));
        assert!(!rule.changed(&installed));
    }

    #[test]
    fn test_bad_pattern() {
        let err = Effect::line_in_file("/etc/x", "(unclosed", "x").unwrap_err();
        assert!(matches!(err, CoreError::Pattern { .. }));
    }

    #[test]
    fn test_builder() {
        let action = Action::new(
            "probe",
            Effect::Shell {
                command: "nvm --version".to_string(),
                chdir: None,
                changed: ChangeRule::Never,
            },
        )
        .tagged(&["node", "nvm"])
        .ignore_errors()
        .register("nvm_probe");

        assert!(action.ignore_errors);
        assert_eq!(action.register.as_deref(), Some("nvm_probe"));
        assert!(action.tags.contains("nvm"));
        assert_eq!(action.effect.kind(), "shell");
    }
}
