//! Builds the executor and host view for the configured target

use std::sync::Arc;

use eyre::{Result, WrapErr};
use hostprov_core::TargetConfig;
use hostprov_exec::{LocalExecutor, RemoteExecutor, SshExecutorBuilder};
use hostprov_host::{HostState, SystemHost};

/// Create the executor for `target`: local for loopback, SSH otherwise
///
/// # Errors
/// Returns error if SSH is needed and no usable key is configured
pub fn executor(target: &TargetConfig) -> Result<Arc<dyn RemoteExecutor>> {
    if target.is_local() {
        return Ok(Arc::new(LocalExecutor::new()));
    }

    let mut builder = SshExecutorBuilder::new(&target.addr, &target.user).with_port(target.port);
    if let Some(path) = &target.ssh_key {
        builder = builder.with_key_path(path);
    } else if let Some(var) = &target.ssh_key_env {
        builder = builder.with_env_key(var);
    }

    let executor = builder
        .build()
        .wrap_err_with(|| format!("failed to set up SSH to {}", target.addr))?;
    Ok(Arc::new(executor))
}

/// Whether commands need sudo, judged by the login user
pub async fn needs_sudo(executor: &dyn RemoteExecutor) -> bool {
    executor
        .run("whoami")
        .await
        .map(|r| r.stdout.trim() != "root")
        .unwrap_or(true)
}

/// An open target: the transport and the host view over it
pub struct Connection {
    pub executor: Arc<dyn RemoteExecutor>,
    pub host: Arc<dyn HostState>,
}

impl Connection {
    /// Close the transport, logging rather than failing the run
    pub async fn close(&self) {
        if let Err(e) = self.executor.disconnect().await {
            tracing::warn!(error = %e, "failed to close connection to target");
        }
    }
}

/// Connect to the target and wrap it in a `HostState`
///
/// # Errors
/// Returns error if the executor cannot be created
pub async fn connect(target: &TargetConfig) -> Result<Connection> {
    let executor = executor(target)?;

    let use_sudo = match target.sudo {
        Some(sudo) => sudo,
        None => needs_sudo(executor.as_ref()).await,
    };
    tracing::info!(
        addr = %target.addr,
        executor = executor.executor_type(),
        use_sudo,
        "connected to target"
    );

    let mut host = SystemHost::new(Arc::clone(&executor), use_sudo);
    if let Some(timeout) = target.command_timeout() {
        host = host.with_command_timeout(timeout);
    }
    Ok(Connection {
        executor,
        host: Arc::new(host),
    })
}
