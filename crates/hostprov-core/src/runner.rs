//! Sequential playbook execution

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use hostprov_exec::CommandResult;
use hostprov_host::{FileKind, HostError, HostState};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::action::{Action, Effect, Registered};
use crate::error::CoreError;
use crate::filter::TagFilter;
use crate::lineinfile;
use crate::playbook::Playbook;
use crate::report::{ActionOutcome, ActionStatus, RunReport};
use crate::template;

/// What applying an effect did
#[derive(Debug, Default)]
struct Applied {
    changed: bool,
    /// Failure that is the command's own, as opposed to a host error
    failure: Option<String>,
    command: Option<CommandResult>,
}

impl Applied {
    fn changed(changed: bool) -> Self {
        Self {
            changed,
            ..Self::default()
        }
    }
}

/// Executes a playbook against one host, strictly in order.
///
/// Host state is never cached: every guard and idempotence check queries
/// the host again.
pub struct Runner {
    host: Arc<dyn HostState>,
    filter: TagFilter,
    registry: BTreeMap<String, Registered>,
}

impl Runner {
    /// Create a runner with a tag filter
    pub fn new(host: Arc<dyn HostState>, filter: TagFilter) -> Self {
        Self {
            host,
            filter,
            registry: BTreeMap::new(),
        }
    }

    /// Results registered so far
    #[must_use]
    pub fn registry(&self) -> &BTreeMap<String, Registered> {
        &self.registry
    }

    /// Run every selected action in declaration order.
    ///
    /// # Errors
    /// Returns `CoreError::ActionFailed` for the first failure not marked
    /// ignorable and `CoreError::Unreachable` if the host stops answering.
    /// Both carry the report up to that point.
    pub async fn run(&mut self, playbook: &Playbook) -> Result<RunReport, CoreError> {
        let mut report = RunReport::new();
        info!(playbook = %playbook.name, "starting run");

        let filter = self.filter.clone();
        for action in playbook.selected(&filter) {
            let span = info_span!("action", name = %action.name, kind = action.effect.kind());
            let outcome = self.run_action(action).instrument(span).await;

            match outcome {
                Ok(outcome) => {
                    let halt = outcome.status == ActionStatus::Failed && !outcome.ignored;
                    let message = outcome.message.clone().unwrap_or_default();
                    report.push(outcome);

                    if halt {
                        report.finish();
                        error!(action = %action.name, error = %message, "run halted");
                        return Err(CoreError::ActionFailed {
                            action: action.name.clone(),
                            message,
                            report: Box::new(report),
                        });
                    }
                }
                Err(unreachable) => {
                    report.push(ActionOutcome {
                        name: action.name.clone(),
                        status: ActionStatus::Failed,
                        message: Some(unreachable.to_string()),
                        ignored: false,
                        duration: std::time::Duration::ZERO,
                    });
                    report.finish();
                    error!(action = %action.name, error = %unreachable, "host unreachable");
                    return Err(CoreError::Unreachable {
                        action: action.name.clone(),
                        message: unreachable.to_string(),
                        report: Box::new(report),
                    });
                }
            }
        }

        report.finish();
        info!(recap = %report.recap(), "run complete");
        Ok(report)
    }

    /// Run one action; `Err` only when the host is unreachable
    async fn run_action(&mut self, action: &Action) -> Result<ActionOutcome, HostError> {
        let start = Instant::now();

        if let Some(guard) = &action.guard
            && !guard.holds(&self.registry)
        {
            info!(action = %action.name, guard = %guard, "skipped");
            if let Some(name) = &action.register {
                self.registry.insert(name.clone(), Registered::skipped());
            }
            return Ok(ActionOutcome {
                name: action.name.clone(),
                status: ActionStatus::Skipped,
                message: Some(format!("guard not met: {guard}")),
                ignored: false,
                duration: start.elapsed(),
            });
        }

        let applied = match self.apply(&action.effect).await {
            Ok(applied) => applied,
            Err(e) if e.is_unreachable() => return Err(e),
            Err(e) => Applied {
                failure: Some(e.to_string()),
                ..Applied::default()
            },
        };

        if let Some(name) = &action.register {
            let command = applied.command.clone().unwrap_or_default();
            self.registry.insert(
                name.clone(),
                Registered {
                    failed: applied.failure.is_some(),
                    changed: applied.changed,
                    skipped: false,
                    rc: applied.command.as_ref().map(|c| c.status),
                    stdout: command.stdout,
                    stderr: command.stderr,
                },
            );
        }

        let duration = start.elapsed();
        let outcome = match applied.failure {
            Some(message) => {
                if action.ignore_errors {
                    warn!(action = %action.name, error = %message, "failed, ignoring");
                } else {
                    error!(action = %action.name, error = %message, "failed");
                }
                ActionOutcome {
                    name: action.name.clone(),
                    status: ActionStatus::Failed,
                    message: Some(message),
                    ignored: action.ignore_errors,
                    duration,
                }
            }
            None => {
                let status = if applied.changed {
                    ActionStatus::Changed
                } else {
                    ActionStatus::Ok
                };
                info!(action = %action.name, status = %status, duration = ?duration, "done");
                ActionOutcome {
                    name: action.name.clone(),
                    status,
                    message: None,
                    ignored: false,
                    duration,
                }
            }
        };

        Ok(outcome)
    }

    async fn apply(&self, effect: &Effect) -> Result<Applied, HostError> {
        let host = self.host.as_ref();

        match effect {
            Effect::Hostname { name } => {
                if host.hostname().await? == *name {
                    return Ok(Applied::changed(false));
                }
                host.set_hostname(name).await?;
                Ok(Applied::changed(true))
            }

            Effect::Packages { names } => {
                let mut missing = Vec::new();
                for name in names {
                    if !host.package_installed(name).await? {
                        missing.push(name.clone());
                    }
                }
                if missing.is_empty() {
                    return Ok(Applied::changed(false));
                }
                debug!(missing = ?missing, "installing packages");
                host.install_packages(&missing).await?;
                Ok(Applied::changed(true))
            }

            Effect::Service {
                name,
                started,
                enabled,
                daemon_reload,
            } => {
                if *daemon_reload {
                    host.daemon_reload().await?;
                }
                let status = host.service_status(name).await?;
                let mut changed = false;
                if *started && !status.active {
                    host.start_service(name).await?;
                    changed = true;
                }
                if *enabled && !status.enabled {
                    host.enable_service(name).await?;
                    changed = true;
                }
                Ok(Applied::changed(changed))
            }

            Effect::FirewallService {
                service,
                permanent,
                immediate,
            } => {
                let mut changed = false;
                if *permanent && !host.firewall_allows(service, true).await? {
                    host.firewall_allow(service, true).await?;
                    changed = true;
                }
                let runtime = *immediate || !*permanent;
                if runtime && !host.firewall_allows(service, false).await? {
                    host.firewall_allow(service, false).await?;
                    changed = true;
                }
                Ok(Applied::changed(changed))
            }

            Effect::Download { url, dest, mode } => {
                if let Some(stat) = host.stat(dest).await? {
                    if stat.matches(None, None, *mode) {
                        return Ok(Applied::changed(false));
                    }
                    host.set_attributes(dest, None, None, *mode).await?;
                    return Ok(Applied::changed(true));
                }
                host.download(url, dest, *mode).await?;
                Ok(Applied::changed(true))
            }

            Effect::Shell {
                command,
                chdir,
                changed,
            } => {
                let result = host.shell(command, chdir.as_deref()).await?;
                let failure = (!result.success()).then(|| {
                    let detail = result.stderr.trim();
                    if detail.is_empty() {
                        format!("non-zero exit status {}", result.status)
                    } else {
                        format!("non-zero exit status {}: {detail}", result.status)
                    }
                });
                Ok(Applied {
                    changed: changed.changed(&result),
                    failure,
                    command: Some(result),
                })
            }

            Effect::Absent { path } => {
                if host.stat(path).await?.is_none() {
                    return Ok(Applied::changed(false));
                }
                host.remove(path).await?;
                Ok(Applied::changed(true))
            }

            Effect::GitClone {
                repo,
                dest,
                version,
                single_branch,
            } => {
                if host.stat(dest).await?.is_some() {
                    debug!(dest = %dest, "checkout exists, leaving it alone");
                    return Ok(Applied::changed(false));
                }
                host.git_clone(repo, dest, version, *single_branch).await?;
                Ok(Applied::changed(true))
            }

            Effect::Directory {
                path,
                owner,
                group,
                mode,
            } => {
                let (owner, group) = (owner.as_deref(), group.as_deref());
                match host.stat(path).await? {
                    Some(stat) if stat.kind != FileKind::Directory => Err(HostError::Precondition(
                        format!("{path} exists and is a {}", stat.kind),
                    )),
                    Some(stat) if stat.matches(owner, group, *mode) => Ok(Applied::changed(false)),
                    Some(_) => {
                        host.set_attributes(path, owner, group, *mode).await?;
                        Ok(Applied::changed(true))
                    }
                    None => {
                        host.create_dir(path).await?;
                        host.set_attributes(path, owner, group, *mode).await?;
                        Ok(Applied::changed(true))
                    }
                }
            }

            Effect::Copy { src, dest, mode } => {
                let contents = host
                    .read_file(src)
                    .await?
                    .ok_or_else(|| HostError::Precondition(format!("source {src} does not exist")))?;
                match host.stat(dest).await? {
                    Some(stat) if stat.matches(None, None, *mode) => Ok(Applied::changed(false)),
                    Some(_) => {
                        host.set_attributes(dest, None, None, *mode).await?;
                        Ok(Applied::changed(true))
                    }
                    None => {
                        host.write_file(dest, &contents, *mode).await?;
                        Ok(Applied::changed(true))
                    }
                }
            }

            Effect::LineInFile { path, regexp, line } => {
                let contents = host
                    .read_file(path)
                    .await?
                    .ok_or_else(|| HostError::Precondition(format!("{path} does not exist")))?;
                let edit = lineinfile::apply(&contents, regexp, line);
                if edit.changed {
                    host.write_file(path, &edit.contents, None).await?;
                }
                Ok(Applied::changed(edit.changed))
            }

            Effect::Template {
                source,
                dest,
                mode,
                vars,
                registered_vars,
            } => {
                let mut context = vars.clone();
                for (var, register) in registered_vars {
                    let value = self
                        .registry
                        .get(register)
                        .filter(|r| !r.skipped && !r.failed)
                        .ok_or_else(|| {
                            HostError::Precondition(format!(
                                "{var} needs the result of `{register}`, which has not run"
                            ))
                        })?;
                    context.insert(var.clone(), value.stdout.trim().to_string());
                }
                let rendered = template::render(source, &context)
                    .map_err(|e| HostError::Precondition(e.to_string()))?;
                self.converge_file(dest, &rendered, *mode).await
            }
        }
    }

    /// Make `dest` hold `contents` with `mode`, writing only on difference
    async fn converge_file(
        &self,
        dest: &str,
        contents: &str,
        mode: Option<u32>,
    ) -> Result<Applied, HostError> {
        let host = self.host.as_ref();

        let current = host.read_file(dest).await?;
        if current.as_deref() == Some(contents) {
            let stat = host.stat(dest).await?;
            if stat.is_some_and(|s| s.matches(None, None, mode)) {
                return Ok(Applied::changed(false));
            }
            host.set_attributes(dest, None, None, mode).await?;
            return Ok(Applied::changed(true));
        }

        host.write_file(dest, contents, mode).await?;
        Ok(Applied::changed(true))
    }
}
