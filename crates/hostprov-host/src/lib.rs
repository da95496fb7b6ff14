//! hostprov-host: Host state capability interface
//!
//! Everything the provisioner knows about the target host goes through the
//! `HostState` trait: packages, services, firewall rules, files, checkouts
//! and raw shell commands. `SystemHost` implements it over a
//! `RemoteExecutor` on dnf/systemd/firewalld systems.

pub mod dnf;
pub mod error;
pub mod fetch;
pub mod files;
pub mod firewalld;
pub mod system;
pub mod systemd;
pub mod traits;
pub mod types;

#[cfg(feature = "test-support")]
pub mod fake;

pub use error::HostError;
pub use system::SystemHost;
pub use traits::HostState;
pub use types::{FileKind, FileStat, ServiceStatus};

#[cfg(feature = "test-support")]
pub use fake::{FakeFile, FakeHost, FakeState};
