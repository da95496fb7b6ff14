use std::sync::Arc;

use hostprov_core::*;
use hostprov_exec::CommandResult;
use hostprov_host::{FakeFile, FakeHost, FakeState, ServiceStatus};

const NVM_SH: &str = "/root/.nvm/nvm.sh";
const NODE_DIR: &str = "/root/.nvm/versions/node/v22.11.0";
const NODE_PATH: &str = "/root/.nvm/versions/node/v22.11.0/bin:/usr/local/bin:/usr/bin";
const CONFIG: &str = "/etc/xo-server/config.toml";

const SAMPLE_CONFIG: &str = "\
# BE *VERY* CAREFUL WHEN EDITING!
[http]
# redirectToHttps = true
# publicUrl = 'https://xoa.company.lan'

[[http.listen]]
port = 80

# [[http.listen]]
# port = 443
# cert = './certificate.pem'
# key = './key.pem'
";

const EXPECTED_CONFIG: &str = "\
# BE *VERY* CAREFUL WHEN EDITING!
[http]
redirectToHttps = true
publicUrl = 'https://xo.lan'

[[http.listen]]
port = 443

# [[http.listen]]
# port = 443
cert = '/etc/pki/tls/certs/xo-server.crt'
key = '/etc/pki/tls/private/xo-server.key'
";

/// Shell behaviour of a Fedora box as far as nvm and node are concerned
fn fedora_shell(cmd: &str, _chdir: Option<&str>, state: &mut FakeState) -> CommandResult {
    if cmd.contains("nvm --version") {
        if state.files.contains_key(NVM_SH) {
            CommandResult::ok("0.40.1\n")
        } else {
            CommandResult::failed(1, "bash: /root/.nvm/nvm.sh: No such file or directory")
        }
    } else if cmd == "bash /tmp/nvm-install.sh" {
        state
            .files
            .insert(NVM_SH.to_string(), FakeFile::file("# nvm\n", 0o644));
        CommandResult::ok("=> Close and reopen your terminal to start using nvm\n")
    } else if cmd.contains("nvm install --lts") {
        if state.files.contains_key(NODE_DIR) {
            CommandResult::ok("v22.11.0 is already installed.\nNow using node v22.11.0 (npm v10.9.0)\n")
        } else {
            state
                .files
                .insert(NODE_DIR.to_string(), FakeFile::dir(0o755));
            CommandResult::ok("Downloading and installing node v22.11.0...\nNow using node v22.11.0\n")
        }
    } else if cmd.contains("echo \"$PATH\"") {
        CommandResult::ok(format!("{NODE_PATH}\n"))
    } else {
        CommandResult::ok("")
    }
}

fn fedora_state() -> FakeState {
    FakeState {
        hostname: "localhost.localdomain".to_string(),
        repo_files: [(
            "packages/xo-server/sample.config.toml".to_string(),
            SAMPLE_CONFIG.to_string(),
        )]
        .into_iter()
        .collect(),
        ..FakeState::default()
    }
}

fn fedora_host() -> Arc<FakeHost> {
    Arc::new(FakeHost::new(fedora_state()).with_shell(fedora_shell))
}

fn playbook() -> Playbook {
    Playbook::xo_server(&Vars::new("xo.lan")).unwrap()
}

async fn run(host: &Arc<FakeHost>, filter: TagFilter) -> Result<RunReport, CoreError> {
    Runner::new(host.clone(), filter).run(&playbook()).await
}

fn statuses(report: &RunReport, names: &[&str]) -> Vec<ActionStatus> {
    names
        .iter()
        .map(|n| report.outcome(n).map(|o| o.status).unwrap())
        .collect()
}

#[tokio::test]
async fn test_fresh_host_is_fully_provisioned() {
    let host = fedora_host();

    let report = run(&host, TagFilter::all()).await.unwrap();

    assert_eq!(report.outcomes.len(), 25);
    let recap = report.recap();
    assert_eq!(recap.failed, 1);
    assert_eq!(recap.ignored, 1);
    assert_eq!(recap.skipped, 0);

    let state = host.state();
    assert_eq!(state.hostname, "xo.lan");
    for package in Vars::new("xo.lan").packages {
        assert!(state.installed_packages.contains(&package), "{package}");
    }
    for service in ["redis", "firewalld", "xo-server"] {
        assert_eq!(
            state.services[service],
            ServiceStatus {
                active: true,
                enabled: true
            }
        );
    }
    for service in ["http", "https"] {
        assert!(state.firewall_permanent.contains(service));
        assert!(state.firewall_runtime.contains(service));
    }

    let config = &state.files[CONFIG];
    assert_eq!(config.mode, 0o640);
    assert_eq!(state.files["/etc/xo-server"].kind, hostprov_host::FileKind::Directory);

    let unit = &state.files["/etc/systemd/system/xo-server.service"].contents;
    assert!(unit.contains(&format!("Environment=\"PATH={NODE_PATH}\"\n")));
    assert!(unit.contains(
        "ExecStart=/usr/bin/env node /opt/xen-orchestra/packages/xo-server/dist/cli.mjs\n"
    ));
}

#[tokio::test]
async fn test_rerun_reports_no_changes() {
    let host = fedora_host();
    run(&host, TagFilter::all()).await.unwrap();
    host.clear_calls();

    let report = run(&host, TagFilter::all()).await.unwrap();

    assert!(report.changed().is_empty(), "changed: {:?}", report.changed());
    assert_eq!(report.recap().failed, 0);
    assert_eq!(report.recap().skipped, 3);

    let mutations: Vec<String> = host
        .calls()
        .into_iter()
        .filter(|c| !c.starts_with("shell") && c != "daemon_reload")
        .collect();
    assert!(mutations.is_empty(), "unexpected mutations: {mutations:?}");
}

#[tokio::test]
async fn test_config_rewrite_is_stable() {
    let host = fedora_host();
    run(&host, TagFilter::all()).await.unwrap();
    assert_eq!(host.state().files[CONFIG].contents, EXPECTED_CONFIG);

    let report = run(&host, TagFilter::new(["config"], Vec::<String>::new()))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 7);
    assert!(report.changed().is_empty());
    assert_eq!(host.state().files[CONFIG].contents, EXPECTED_CONFIG);
}

#[tokio::test]
async fn test_missing_nvm_installs_it_once() {
    let host = fedora_host();

    let report = run(&host, TagFilter::new(["nvm"], Vec::<String>::new()))
        .await
        .unwrap();

    assert_eq!(
        statuses(
            &report,
            &[
                "Check for a working nvm",
                "Download nvm install script",
                "Run nvm install script",
                "Remove nvm install script"
            ]
        ),
        vec![
            ActionStatus::Failed,
            ActionStatus::Changed,
            ActionStatus::Changed,
            ActionStatus::Changed
        ]
    );
    assert!(report.outcome("Check for a working nvm").unwrap().ignored);

    let calls = host.calls();
    let downloads = calls.iter().filter(|c| c.starts_with("download ")).count();
    let installs = calls
        .iter()
        .filter(|c| *c == "shell bash /tmp/nvm-install.sh")
        .count();
    assert_eq!(downloads, 1);
    assert_eq!(installs, 1);
    assert!(calls.contains(
        &"download https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.1/install.sh /tmp/nvm-install.sh"
            .to_string()
    ));

    let state = host.state();
    assert!(!state.files.contains_key("/tmp/nvm-install.sh"));
    assert!(state.files.contains_key(NVM_SH));
}

#[tokio::test]
async fn test_working_nvm_skips_install() {
    let host = fedora_host();
    host.state()
        .files
        .insert(NVM_SH.to_string(), FakeFile::file("# nvm\n", 0o644));

    let report = run(&host, TagFilter::new(["node"], Vec::<String>::new()))
        .await
        .unwrap();

    assert_eq!(
        statuses(
            &report,
            &[
                "Check for a working nvm",
                "Download nvm install script",
                "Run nvm install script",
                "Remove nvm install script",
                "Install latest LTS node",
                "Enable corepack"
            ]
        ),
        vec![
            ActionStatus::Ok,
            ActionStatus::Skipped,
            ActionStatus::Skipped,
            ActionStatus::Skipped,
            ActionStatus::Changed,
            ActionStatus::Ok
        ]
    );
    assert!(!host.calls().iter().any(|c| c.starts_with("download ")));
}

#[tokio::test]
async fn test_single_tag_touches_nothing_else() {
    let host = fedora_host();

    let report = run(&host, TagFilter::new(["firewall"], Vec::<String>::new()))
        .await
        .unwrap();

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Start and enable firewalld",
            "Allow http through the firewall",
            "Allow https through the firewall"
        ]
    );
    assert_eq!(
        host.calls(),
        vec![
            "start_service firewalld",
            "enable_service firewalld",
            "firewall_allow http permanent=true",
            "firewall_allow http permanent=false",
            "firewall_allow https permanent=true",
            "firewall_allow https permanent=false",
        ]
    );

    let state = host.state();
    assert_eq!(state.hostname, "localhost.localdomain");
    assert!(state.installed_packages.is_empty());
    assert!(state.files.is_empty());
}

#[tokio::test]
async fn test_skip_tags_leave_only_system_actions() {
    let host = fedora_host();

    let report = run(
        &host,
        TagFilter::new(Vec::<String>::new(), ["node", "xo", "service"]),
    )
    .await
    .unwrap();

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.recap().changed, 6);
    assert!(host.state().files.is_empty());
}

#[tokio::test]
async fn test_build_failure_halts_before_config() {
    let host = Arc::new(
        FakeHost::new(fedora_state()).with_shell(|cmd, chdir, state| {
            if cmd.contains("yarn build") {
                CommandResult::failed(1, "error Command failed with exit code 137.")
            } else {
                fedora_shell(cmd, chdir, state)
            }
        }),
    );

    let err = run(&host, TagFilter::all()).await.unwrap_err();

    let CoreError::ActionFailed {
        action,
        message,
        report,
    } = err
    else {
        panic!("expected an action failure");
    };
    assert_eq!(action, "Build xen-orchestra");
    assert!(message.contains("exit code 137"));
    assert_eq!(report.outcomes.len(), 15);
    assert_eq!(
        report.outcomes.last().map(|o| o.status),
        Some(ActionStatus::Failed)
    );
    assert!(report.finished_at.is_some());

    let state = host.state();
    assert!(!state.files.contains_key("/etc/xo-server"));
    assert!(!state.services.contains_key("xo-server"));
}

#[tokio::test]
async fn test_rerun_after_failure_converges() {
    let host = Arc::new(
        FakeHost::new(fedora_state()).with_shell(|cmd, chdir, state| {
            if cmd.contains("yarn build") && !state.files.contains_key("/marker/build-fixed") {
                CommandResult::failed(1, "out of memory")
            } else {
                fedora_shell(cmd, chdir, state)
            }
        }),
    );
    assert!(run(&host, TagFilter::all()).await.is_err());

    host.state()
        .files
        .insert("/marker/build-fixed".to_string(), FakeFile::file("", 0o644));
    let report = run(&host, TagFilter::all()).await.unwrap();

    assert_eq!(
        report.outcome("Clone xen-orchestra").map(|o| o.status),
        Some(ActionStatus::Ok)
    );
    assert_eq!(host.state().files[CONFIG].contents, EXPECTED_CONFIG);
}
