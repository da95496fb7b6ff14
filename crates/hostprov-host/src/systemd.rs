//! systemd service and hostname commands

use hostprov_exec::{CommandResult, quote};

pub(crate) fn get_hostname_cmd() -> String {
    "hostnamectl --static".to_string()
}

pub(crate) fn set_hostname_cmd(name: &str) -> String {
    format!("hostnamectl set-hostname {}", quote(name))
}

pub(crate) fn is_active_cmd(name: &str) -> String {
    format!("systemctl is-active {}", quote(name))
}

pub(crate) fn is_enabled_cmd(name: &str) -> String {
    format!("systemctl is-enabled {}", quote(name))
}

pub(crate) fn start_cmd(name: &str) -> String {
    format!("systemctl start {}", quote(name))
}

pub(crate) fn enable_cmd(name: &str) -> String {
    format!("systemctl enable {}", quote(name))
}

pub(crate) fn daemon_reload_cmd() -> String {
    "systemctl daemon-reload".to_string()
}

/// `is-active` prints `active` for running units; anything else is stopped
pub(crate) fn parse_active(result: &CommandResult) -> bool {
    result.stdout.trim() == "active"
}

/// `is-enabled` exits 0 for every state that starts the unit at boot
pub(crate) fn parse_enabled(result: &CommandResult) -> bool {
    result.success()
}
