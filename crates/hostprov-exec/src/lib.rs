//! hostprov-exec: Command execution against the target host
//!
//! Provides the `RemoteExecutor` trait and implementations for running shell
//! commands locally or over SSH.

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod shell;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, KeySource, ResolvedKey};
pub use local::LocalExecutor;
pub use result::{CommandResult, ConnectionInfo};
pub use shell::quote;
pub use ssh::{SshExecutor, SshExecutorBuilder};
pub use traits::RemoteExecutor;
