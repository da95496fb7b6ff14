//! Host capability trait

use async_trait::async_trait;
use hostprov_exec::CommandResult;

use crate::error::HostError;
use crate::types::{FileStat, ServiceStatus};

/// Live view of the target host.
///
/// Every query goes to the host; implementations must not cache answers
/// between calls, since each provisioning action may change what the next
/// one sees.
#[async_trait]
pub trait HostState: Send + Sync {
    /// Current static hostname
    async fn hostname(&self) -> Result<String, HostError>;

    /// Set the static hostname
    async fn set_hostname(&self, name: &str) -> Result<(), HostError>;

    /// Whether an OS package is installed
    async fn package_installed(&self, name: &str) -> Result<bool, HostError>;

    /// Install OS packages in one transaction
    async fn install_packages(&self, names: &[String]) -> Result<(), HostError>;

    /// Runtime and boot state of a service
    async fn service_status(&self, name: &str) -> Result<ServiceStatus, HostError>;

    /// Start a service now
    async fn start_service(&self, name: &str) -> Result<(), HostError>;

    /// Start a service at boot
    async fn enable_service(&self, name: &str) -> Result<(), HostError>;

    /// Reload the service manager's unit cache
    async fn daemon_reload(&self) -> Result<(), HostError>;

    /// Whether the firewall lets a named service through
    async fn firewall_allows(&self, service: &str, permanent: bool) -> Result<bool, HostError>;

    /// Let a named service through the firewall
    async fn firewall_allow(&self, service: &str, permanent: bool) -> Result<(), HostError>;

    /// Metadata for `path`, `None` if it does not exist
    async fn stat(&self, path: &str) -> Result<Option<FileStat>, HostError>;

    /// Contents of a regular file, `None` if it does not exist
    async fn read_file(&self, path: &str) -> Result<Option<String>, HostError>;

    /// Replace a file's contents.
    ///
    /// With `mode` the file is replaced atomically and gets that mode;
    /// without it an existing file keeps its mode and ownership.
    async fn write_file(
        &self,
        path: &str,
        contents: &str,
        mode: Option<u32>,
    ) -> Result<(), HostError>;

    /// Remove a path recursively; absent paths are not an error
    async fn remove(&self, path: &str) -> Result<(), HostError>;

    /// Create a directory and its parents
    async fn create_dir(&self, path: &str) -> Result<(), HostError>;

    /// Set ownership and permission bits; `None` leaves that attribute alone
    async fn set_attributes(
        &self,
        path: &str,
        owner: Option<&str>,
        group: Option<&str>,
        mode: Option<u32>,
    ) -> Result<(), HostError>;

    /// Fetch `url` into `dest` on the host
    async fn download(&self, url: &str, dest: &str, mode: Option<u32>) -> Result<(), HostError>;

    /// Clone `repo` at `version` into `dest`
    async fn git_clone(
        &self,
        repo: &str,
        dest: &str,
        version: &str,
        single_branch: bool,
    ) -> Result<(), HostError>;

    /// Run a shell command, optionally from `chdir`.
    ///
    /// A non-zero exit is returned in the result, not as an error.
    async fn shell(&self, command: &str, chdir: Option<&str>) -> Result<CommandResult, HostError>;
}
