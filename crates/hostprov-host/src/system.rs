//! `HostState` over a `RemoteExecutor` on dnf/systemd/firewalld hosts

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hostprov_exec::{CommandResult, RemoteExecutor, quote};
use tracing::{debug, info, instrument};

use crate::error::HostError;
use crate::traits::HostState;
use crate::types::{FileStat, ServiceStatus};
use crate::{dnf, fetch, files, firewalld, systemd};

/// Live host backed by shell commands
pub struct SystemHost {
    executor: Arc<dyn RemoteExecutor>,
    use_sudo: bool,
    command_timeout: Option<Duration>,
}

impl std::fmt::Debug for SystemHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemHost")
            .field("executor", &self.executor.executor_type())
            .field("use_sudo", &self.use_sudo)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl SystemHost {
    /// Create a new system host
    ///
    /// # Arguments
    /// * `executor` - Executor connected to the target host
    /// * `use_sudo` - Whether to run every command through `sudo`
    pub fn new(executor: Arc<dyn RemoteExecutor>, use_sudo: bool) -> Self {
        Self {
            executor,
            use_sudo,
            command_timeout: None,
        }
    }

    /// Bound every command by `timeout`
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    fn wrap(&self, cmd: &str) -> String {
        if self.use_sudo {
            format!("sudo -n sh -c {}", quote(cmd))
        } else {
            cmd.to_string()
        }
    }

    async fn exec(&self, cmd: &str) -> Result<CommandResult, HostError> {
        let wrapped = self.wrap(cmd);
        let result = match self.command_timeout {
            Some(timeout) => self.executor.run_with_timeout(&wrapped, timeout).await?,
            None => self.executor.run(&wrapped).await?,
        };

        if self.use_sudo
            && result.status == 1
            && result.stderr.contains("sudo: a password is required")
        {
            return Err(HostError::PermissionDenied(result.stderr.trim().to_string()));
        }
        Ok(result)
    }

    /// Run and turn a non-zero exit into `HostError::CommandFailed`
    async fn check(&self, cmd: &str) -> Result<CommandResult, HostError> {
        let result = self.exec(cmd).await?;
        if !result.success() {
            return Err(HostError::CommandFailed {
                command: cmd.to_string(),
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }
}

#[async_trait]
impl HostState for SystemHost {
    async fn hostname(&self) -> Result<String, HostError> {
        let result = self.check(&systemd::get_hostname_cmd()).await?;
        Ok(result.stdout.trim().to_string())
    }

    #[instrument(skip(self))]
    async fn set_hostname(&self, name: &str) -> Result<(), HostError> {
        self.check(&systemd::set_hostname_cmd(name)).await?;
        info!(hostname = %name, "hostname set");
        Ok(())
    }

    async fn package_installed(&self, name: &str) -> Result<bool, HostError> {
        let result = self.exec(&dnf::query_cmd(name)).await?;
        Ok(result.success())
    }

    #[instrument(skip(self))]
    async fn install_packages(&self, names: &[String]) -> Result<(), HostError> {
        let cmd = dnf::install_cmd(names);
        let result = self.exec(&cmd).await?;

        if !result.success() {
            let missing = dnf::parse_missing_packages(&result.combined_output());
            if !missing.is_empty() {
                return Err(HostError::PackageNotFound(missing.join(", ")));
            }
            return Err(HostError::CommandFailed {
                command: cmd,
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }

        info!(count = names.len(), "packages installed");
        Ok(())
    }

    async fn service_status(&self, name: &str) -> Result<ServiceStatus, HostError> {
        let active = self.exec(&systemd::is_active_cmd(name)).await?;
        let enabled = self.exec(&systemd::is_enabled_cmd(name)).await?;

        Ok(ServiceStatus {
            active: systemd::parse_active(&active),
            enabled: systemd::parse_enabled(&enabled),
        })
    }

    #[instrument(skip(self))]
    async fn start_service(&self, name: &str) -> Result<(), HostError> {
        self.check(&systemd::start_cmd(name)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn enable_service(&self, name: &str) -> Result<(), HostError> {
        self.check(&systemd::enable_cmd(name)).await?;
        Ok(())
    }

    async fn daemon_reload(&self) -> Result<(), HostError> {
        self.check(&systemd::daemon_reload_cmd()).await?;
        Ok(())
    }

    async fn firewall_allows(&self, service: &str, permanent: bool) -> Result<bool, HostError> {
        let cmd = firewalld::query_cmd(service, permanent);
        let result = self.exec(&cmd).await?;
        firewalld::parse_query(&cmd, &result)
    }

    #[instrument(skip(self))]
    async fn firewall_allow(&self, service: &str, permanent: bool) -> Result<(), HostError> {
        self.check(&firewalld::add_cmd(service, permanent)).await?;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<FileStat>, HostError> {
        let cmd = files::stat_cmd(path);
        let result = self.exec(&cmd).await?;

        if !result.success() {
            if files::is_missing(&result) {
                return Ok(None);
            }
            return Err(HostError::CommandFailed {
                command: cmd,
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }
        files::parse_stat(&result.stdout).map(Some)
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, HostError> {
        let cmd = files::read_cmd(path);
        let result = self.exec(&cmd).await?;

        if !result.success() {
            if files::is_missing(&result) {
                return Ok(None);
            }
            return Err(HostError::CommandFailed {
                command: cmd,
                status: result.status,
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(Some(result.stdout))
    }

    #[instrument(skip(self, contents), fields(bytes = contents.len()))]
    async fn write_file(
        &self,
        path: &str,
        contents: &str,
        mode: Option<u32>,
    ) -> Result<(), HostError> {
        self.check(&files::write_cmd(path, contents, mode)).await?;
        debug!(path = %path, "file written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, path: &str) -> Result<(), HostError> {
        self.check(&files::remove_cmd(path)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_dir(&self, path: &str) -> Result<(), HostError> {
        self.check(&files::mkdir_cmd(path)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_attributes(
        &self,
        path: &str,
        owner: Option<&str>,
        group: Option<&str>,
        mode: Option<u32>,
    ) -> Result<(), HostError> {
        if let Some(cmd) = files::attributes_cmd(path, owner, group, mode) {
            self.check(&cmd).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download(&self, url: &str, dest: &str, mode: Option<u32>) -> Result<(), HostError> {
        self.check(&fetch::download_cmd(url, dest)).await?;
        self.set_attributes(dest, None, None, mode).await
    }

    #[instrument(skip(self))]
    async fn git_clone(
        &self,
        repo: &str,
        dest: &str,
        version: &str,
        single_branch: bool,
    ) -> Result<(), HostError> {
        self.check(&fetch::clone_cmd(repo, dest, version, single_branch))
            .await?;
        info!(repo = %repo, dest = %dest, version = %version, "repository cloned");
        Ok(())
    }

    async fn shell(&self, command: &str, chdir: Option<&str>) -> Result<CommandResult, HostError> {
        let cmd = match chdir {
            Some(dir) => format!("cd {} && {command}", quote(dir)),
            None => command.to_string(),
        };
        self.exec(&cmd).await
    }
}
