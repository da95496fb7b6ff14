//! Run outcomes and recap

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final classification of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Ran; the host was already in the desired state
    Ok,
    /// Ran and changed the host
    Changed,
    /// Ran and failed
    Failed,
    /// Guard did not hold
    Skipped,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionStatus::Ok => write!(f, "ok"),
            ActionStatus::Changed => write!(f, "changed"),
            ActionStatus::Failed => write!(f, "failed"),
            ActionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// What happened to one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub name: String,
    pub status: ActionStatus,
    /// Failure reason, or the guard that skipped the action
    pub message: Option<String>,
    /// Failed, but the action tolerates failure
    pub ignored: bool,
    pub duration: Duration,
}

/// Counts per status; `ignored` is the subset of `failed` that did not halt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Recap {
    pub ok: usize,
    pub changed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub ignored: usize,
}

impl std::fmt::Display for Recap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ok={} changed={} failed={} skipped={} ignored={}",
            self.ok, self.changed, self.failed, self.skipped, self.ignored
        )
    }
}

/// Ordered outcomes of every selected action that was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<ActionOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Empty report starting now
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn push(&mut self, outcome: ActionOutcome) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Outcome of the named action, if it was reached
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&ActionOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Names of actions that reported a change, in order
    #[must_use]
    pub fn changed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == ActionStatus::Changed)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Status counts
    #[must_use]
    pub fn recap(&self) -> Recap {
        let mut recap = Recap::default();
        for outcome in &self.outcomes {
            match outcome.status {
                ActionStatus::Ok => recap.ok += 1,
                ActionStatus::Changed => recap.changed += 1,
                ActionStatus::Failed => {
                    recap.failed += 1;
                    if outcome.ignored {
                        recap.ignored += 1;
                    }
                }
                ActionStatus::Skipped => recap.skipped += 1,
            }
        }
        recap
    }
}
