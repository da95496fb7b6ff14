//! Executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs shell commands on the target host.
///
/// A non-zero exit status is not an error at this layer; callers inspect
/// `CommandResult::status` and decide what failure means for them.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command through `sh -c`
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, giving up after `timeout`
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Whether a session to the host is currently open
    fn is_connected(&self) -> bool {
        true
    }

    /// Close any open session; a later `run` reconnects
    ///
    /// # Errors
    /// Returns `ExecError::IoError` if the session does not close cleanly
    async fn disconnect(&self) -> Result<(), ExecError> {
        Ok(())
    }

    /// Short name of the transport, used in logs
    fn executor_type(&self) -> &'static str;
}
