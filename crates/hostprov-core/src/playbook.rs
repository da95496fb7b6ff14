//! The fixed, ordered list of provisioning actions

use std::collections::BTreeMap;

use hostprov_exec::quote;

use crate::action::{Action, ChangeRule, Effect, Guard};
use crate::config::Vars;
use crate::error::CoreError;
use crate::filter::TagFilter;
use crate::template;

/// Register holding the nvm probe result
pub const NVM_PROBE: &str = "nvm_probe";
/// Register holding the node `PATH`
pub const NODE_PATH: &str = "node_path";

/// Ordered actions; later ones may depend on side effects of earlier ones
#[derive(Debug, Clone)]
pub struct Playbook {
    pub name: String,
    pub actions: Vec<Action>,
}

/// Run `cmd` in bash with nvm loaded
fn with_nvm(cmd: &str) -> String {
    let script = format!("source \"$HOME/.nvm/nvm.sh\" && {cmd}");
    format!("bash -c {}", quote(&script))
}

fn shell(command: String, chdir: Option<&str>, changed: ChangeRule) -> Effect {
    Effect::Shell {
        command,
        chdir: chdir.map(String::from),
        changed,
    }
}

impl Playbook {
    /// Actions in declaration order that pass `filter`
    pub fn selected<'a>(&'a self, filter: &'a TagFilter) -> impl Iterator<Item = &'a Action> {
        self.actions.iter().filter(move |a| filter.matches(a))
    }

    /// Provision a host to build and run xo-server from source
    ///
    /// # Errors
    /// Returns `CoreError::Config` if `vars` fail validation
    pub fn xo_server(vars: &Vars) -> Result<Self, CoreError> {
        vars.validate()?;

        let xo_path = vars.xo_path.as_str();
        let config_path = vars.xo_config_path();
        let sample_config = format!("{xo_path}/packages/xo-server/sample.config.toml");

        let mut actions = vec![
            Action::new(
                "Set hostname",
                Effect::Hostname {
                    name: vars.hostname.clone(),
                },
            )
            .tagged(&["system", "hostname"]),
            Action::new(
                "Install OS packages",
                Effect::Packages {
                    names: vars.packages.clone(),
                },
            )
            .tagged(&["system", "packages"]),
            Action::new(
                format!("Start and enable {}", vars.cache_service),
                Effect::Service {
                    name: vars.cache_service.clone(),
                    started: true,
                    enabled: true,
                    daemon_reload: false,
                },
            )
            .tagged(&["system", "services"]),
            Action::new(
                "Start and enable firewalld",
                Effect::Service {
                    name: "firewalld".to_string(),
                    started: true,
                    enabled: true,
                    daemon_reload: false,
                },
            )
            .tagged(&["system", "services", "firewall"]),
        ];

        for service in ["http", "https"] {
            actions.push(
                Action::new(
                    format!("Allow {service} through the firewall"),
                    Effect::FirewallService {
                        service: service.to_string(),
                        permanent: true,
                        immediate: true,
                    },
                )
                .tagged(&["firewall"]),
            );
        }

        actions.extend([
            Action::new(
                "Check for a working nvm",
                shell(with_nvm("nvm --version"), None, ChangeRule::Never),
            )
            .tagged(&["node", "nvm"])
            .ignore_errors()
            .register(NVM_PROBE),
            Action::new(
                "Download nvm install script",
                Effect::Download {
                    url: format!(
                        "https://raw.githubusercontent.com/nvm-sh/nvm/{}/install.sh",
                        vars.nvm_version
                    ),
                    dest: vars.nvm_script_path.clone(),
                    mode: Some(0o755),
                },
            )
            .tagged(&["node", "nvm"])
            .when(Guard::Failed(NVM_PROBE.to_string())),
            Action::new(
                "Run nvm install script",
                shell(
                    format!("bash {}", quote(&vars.nvm_script_path)),
                    None,
                    ChangeRule::Always,
                ),
            )
            .tagged(&["node", "nvm"])
            .when(Guard::Failed(NVM_PROBE.to_string())),
            Action::new(
                "Remove nvm install script",
                Effect::Absent {
                    path: vars.nvm_script_path.clone(),
                },
            )
            .tagged(&["node", "nvm"])
            .when(Guard::Failed(NVM_PROBE.to_string())),
            Action::new(
                "Install latest LTS node",
                shell(
                    with_nvm("nvm install --lts"),
                    None,
                    ChangeRule::OutputLacks("is already installed".to_string()),
                ),
            )
            .tagged(&["node"]),
            Action::new(
                "Enable corepack",
                shell(with_nvm("corepack enable"), None, ChangeRule::NonZeroExit),
            )
            .tagged(&["node"]),
            Action::new(
                "Clone xen-orchestra",
                Effect::GitClone {
                    repo: vars.xo_repo.clone(),
                    dest: vars.xo_path.clone(),
                    version: vars.xo_version.clone(),
                    single_branch: true,
                },
            )
            .tagged(&["xo", "clone"]),
            Action::new(
                "Install xen-orchestra dependencies",
                shell(with_nvm("yarn"), Some(xo_path), ChangeRule::NonZeroExit),
            )
            .tagged(&["xo", "build"]),
            Action::new(
                "Build xen-orchestra",
                shell(with_nvm("yarn build"), Some(xo_path), ChangeRule::NonZeroExit),
            )
            .tagged(&["xo", "build"]),
            Action::new(
                "Create xo-server config directory",
                Effect::Directory {
                    path: vars.xo_config_dir.clone(),
                    owner: Some(vars.xo_config_owner.clone()),
                    group: Some(vars.xo_config_group.clone()),
                    mode: Some(0o755),
                },
            )
            .tagged(&["xo", "config"]),
            Action::new(
                "Copy sample xo-server config",
                Effect::Copy {
                    src: sample_config,
                    dest: config_path.clone(),
                    mode: Some(0o640),
                },
            )
            .tagged(&["xo", "config"]),
        ]);

        let edits = [
            (
                "Redirect HTTP to HTTPS",
                r"^#?\s*redirectToHttps\s*=",
                "redirectToHttps = true".to_string(),
            ),
            (
                "Set public URL",
                r"^#?\s*publicUrl\s*=",
                format!("publicUrl = 'https://{}'", vars.hostname),
            ),
            (
                "Set listening port",
                r"^port\s*=",
                format!("port = {}", vars.http_port),
            ),
            (
                "Set certificate path",
                r"^#?\s*cert\s*=",
                format!("cert = '{}'", vars.xo_cert),
            ),
            (
                "Set key path",
                r"^#?\s*key\s*=",
                format!("key = '{}'", vars.xo_key),
            ),
        ];
        for (name, regexp, line) in edits {
            actions.push(
                Action::new(name, Effect::line_in_file(&config_path, regexp, line)?)
                    .tagged(&["xo", "config"]),
            );
        }

        actions.extend([
            Action::new(
                "Look up node PATH",
                shell(with_nvm("echo \"$PATH\""), None, ChangeRule::NonZeroExit),
            )
            .tagged(&["service"])
            .register(NODE_PATH),
            Action::new(
                "Render xo-server unit",
                Effect::Template {
                    source: template::SERVICE_UNIT.to_string(),
                    dest: vars.unit_path(),
                    mode: Some(0o644),
                    vars: BTreeMap::from([("xo_path".to_string(), vars.xo_path.clone())]),
                    registered_vars: BTreeMap::from([(
                        "node_path".to_string(),
                        NODE_PATH.to_string(),
                    )]),
                },
            )
            .tagged(&["service"]),
            Action::new(
                format!("Start and enable {}", vars.service_name),
                Effect::Service {
                    name: vars.service_name.clone(),
                    started: true,
                    enabled: true,
                    daemon_reload: true,
                },
            )
            .tagged(&["service"]),
        ]);

        Ok(Self {
            name: format!("Provision {}", vars.hostname),
            actions,
        })
    }
}
