//! In-memory `HostState` for tests
//!
//! Every mutating call is appended to `FakeState::calls` so tests can assert
//! what ran and in which order. Shell commands go through a replaceable
//! handler that may also mutate the state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use hostprov_exec::CommandResult;

use crate::error::HostError;
use crate::traits::HostState;
use crate::types::{FileKind, FileStat, ServiceStatus};

/// A file or directory on the fake host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFile {
    pub kind: FileKind,
    pub contents: String,
    pub mode: u32,
    pub owner: String,
    pub group: String,
}

impl FakeFile {
    /// Regular root-owned file
    pub fn file(contents: impl Into<String>, mode: u32) -> Self {
        Self {
            kind: FileKind::File,
            contents: contents.into(),
            mode,
            owner: "root".to_string(),
            group: "root".to_string(),
        }
    }

    /// Root-owned directory
    #[must_use]
    pub fn dir(mode: u32) -> Self {
        Self {
            kind: FileKind::Directory,
            contents: String::new(),
            mode,
            owner: "root".to_string(),
            group: "root".to_string(),
        }
    }
}

/// Observable state of the fake host
#[derive(Debug, Default)]
pub struct FakeState {
    pub hostname: String,
    /// Packages the repositories can provide; `None` means any
    pub available_packages: Option<BTreeSet<String>>,
    pub installed_packages: BTreeSet<String>,
    pub services: BTreeMap<String, ServiceStatus>,
    pub firewall_runtime: BTreeSet<String>,
    pub firewall_permanent: BTreeSet<String>,
    pub files: BTreeMap<String, FakeFile>,
    /// Files materialised under the destination by `git_clone`,
    /// keyed by path relative to the checkout
    pub repo_files: BTreeMap<String, String>,
    /// Mutating calls in order
    pub calls: Vec<String>,
    /// Every call fails with `HostError::Unreachable` while set
    pub unreachable: bool,
}

type ShellHandler = Box<dyn Fn(&str, Option<&str>, &mut FakeState) -> CommandResult + Send + Sync>;

/// In-memory host
pub struct FakeHost {
    state: Mutex<FakeState>,
    shell: ShellHandler,
}

impl std::fmt::Debug for FakeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeHost")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new(FakeState::default())
    }
}

impl FakeHost {
    /// Fake host whose shell commands all succeed with no output
    #[must_use]
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
            shell: Box::new(|_, _, _| CommandResult::ok("")),
        }
    }

    /// Replace the shell handler
    #[must_use]
    pub fn with_shell<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, Option<&str>, &mut FakeState) -> CommandResult + Send + Sync + 'static,
    {
        self.shell = Box::new(handler);
        self
    }

    /// Lock the state for inspection or setup
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the call log
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Clear the call log, keeping everything else
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Lock the state for a trait call, failing if the host is gone
    fn reach(&self) -> Result<MutexGuard<'_, FakeState>, HostError> {
        let state = self.state();
        if state.unreachable {
            return Err(HostError::Unreachable("connection reset by peer".to_string()));
        }
        Ok(state)
    }

    fn record(state: &mut FakeState, call: String) {
        state.calls.push(call);
    }
}

#[async_trait]
impl HostState for FakeHost {
    async fn hostname(&self) -> Result<String, HostError> {
        Ok(self.reach()?.hostname.clone())
    }

    async fn set_hostname(&self, name: &str) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("set_hostname {name}"));
        state.hostname = name.to_string();
        Ok(())
    }

    async fn package_installed(&self, name: &str) -> Result<bool, HostError> {
        Ok(self.reach()?.installed_packages.contains(name))
    }

    async fn install_packages(&self, names: &[String]) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("install_packages {}", names.join(" ")));

        if let Some(available) = &state.available_packages {
            let missing: Vec<&str> = names
                .iter()
                .filter(|n| !available.contains(*n))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(HostError::PackageNotFound(missing.join(", ")));
            }
        }
        state.installed_packages.extend(names.iter().cloned());
        Ok(())
    }

    async fn service_status(&self, name: &str) -> Result<ServiceStatus, HostError> {
        Ok(self.reach()?.services.get(name).copied().unwrap_or_default())
    }

    async fn start_service(&self, name: &str) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("start_service {name}"));
        state.services.entry(name.to_string()).or_default().active = true;
        Ok(())
    }

    async fn enable_service(&self, name: &str) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("enable_service {name}"));
        state.services.entry(name.to_string()).or_default().enabled = true;
        Ok(())
    }

    async fn daemon_reload(&self) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, "daemon_reload".to_string());
        Ok(())
    }

    async fn firewall_allows(&self, service: &str, permanent: bool) -> Result<bool, HostError> {
        let state = self.reach()?;
        let rules = if permanent {
            &state.firewall_permanent
        } else {
            &state.firewall_runtime
        };
        Ok(rules.contains(service))
    }

    async fn firewall_allow(&self, service: &str, permanent: bool) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(
            &mut state,
            format!("firewall_allow {service} permanent={permanent}"),
        );
        if permanent {
            state.firewall_permanent.insert(service.to_string());
        } else {
            state.firewall_runtime.insert(service.to_string());
        }
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<FileStat>, HostError> {
        Ok(self.reach()?.files.get(path).map(|f| FileStat {
            kind: f.kind,
            mode: f.mode,
            owner: f.owner.clone(),
            group: f.group.clone(),
        }))
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>, HostError> {
        match self.reach()?.files.get(path) {
            Some(f) if f.kind == FileKind::Directory => Err(HostError::CommandFailed {
                command: format!("cat -- {path}"),
                status: 1,
                stderr: format!("cat: {path}: Is a directory"),
            }),
            Some(f) => Ok(Some(f.contents.clone())),
            None => Ok(None),
        }
    }

    async fn write_file(
        &self,
        path: &str,
        contents: &str,
        mode: Option<u32>,
    ) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("write_file {path}"));

        let file = state
            .files
            .entry(path.to_string())
            .or_insert_with(|| FakeFile::file("", 0o644));
        file.contents = contents.to_string();
        if let Some(mode) = mode {
            file.mode = mode;
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("remove {path}"));

        let prefix = format!("{}/", path.trim_end_matches('/'));
        state
            .files
            .retain(|p, _| p != path && !p.starts_with(&prefix));
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("create_dir {path}"));
        state
            .files
            .entry(path.to_string())
            .or_insert_with(|| FakeFile::dir(0o755));
        Ok(())
    }

    async fn set_attributes(
        &self,
        path: &str,
        owner: Option<&str>,
        group: Option<&str>,
        mode: Option<u32>,
    ) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("set_attributes {path}"));

        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| HostError::Precondition(format!("{path} does not exist")))?;
        if let Some(owner) = owner {
            file.owner = owner.to_string();
        }
        if let Some(group) = group {
            file.group = group.to_string();
        }
        if let Some(mode) = mode {
            file.mode = mode;
        }
        Ok(())
    }

    async fn download(&self, url: &str, dest: &str, mode: Option<u32>) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(&mut state, format!("download {url} {dest}"));
        state.files.insert(
            dest.to_string(),
            FakeFile::file(format!("#!/bin/sh\n# {url}\n"), mode.unwrap_or(0o644)),
        );
        Ok(())
    }

    async fn git_clone(
        &self,
        repo: &str,
        dest: &str,
        version: &str,
        single_branch: bool,
    ) -> Result<(), HostError> {
        let mut state = self.reach()?;
        Self::record(
            &mut state,
            format!("git_clone {repo} {dest} {version} single_branch={single_branch}"),
        );

        if state.files.contains_key(dest) {
            return Err(HostError::CommandFailed {
                command: format!("git clone {repo} {dest}"),
                status: 128,
                stderr: format!("fatal: destination path '{dest}' already exists"),
            });
        }
        state.files.insert(dest.to_string(), FakeFile::dir(0o755));
        let checkout: Vec<(String, String)> = state
            .repo_files
            .iter()
            .map(|(rel, contents)| (format!("{dest}/{rel}"), contents.clone()))
            .collect();
        for (path, contents) in checkout {
            state.files.insert(path, FakeFile::file(contents, 0o644));
        }
        Ok(())
    }

    async fn shell(&self, command: &str, chdir: Option<&str>) -> Result<CommandResult, HostError> {
        let mut state = self.reach()?;
        let call = match chdir {
            Some(dir) => format!("shell [{dir}] {command}"),
            None => format!("shell {command}"),
        };
        Self::record(&mut state, call);
        Ok((self.shell)(command, chdir, &mut state))
    }
}
