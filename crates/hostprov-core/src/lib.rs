//! hostprov-core: Provisioning actions and the sequential runner
//!
//! A `Playbook` is a fixed, ordered list of `Action`s. The `Runner` walks it
//! against a `HostState`, skipping actions outside the tag filter or whose
//! guard does not hold, and halts at the first failure not marked ignorable.

pub mod action;
pub mod config;
pub mod error;
pub mod filter;
pub mod lineinfile;
pub mod playbook;
pub mod report;
pub mod runner;
pub mod template;

pub use action::{Action, ChangeRule, Effect, Guard, Registered};
pub use config::{TargetConfig, Vars};
pub use error::CoreError;
pub use filter::TagFilter;
pub use playbook::Playbook;
pub use report::{ActionOutcome, ActionStatus, Recap, RunReport};
pub use runner::Runner;
