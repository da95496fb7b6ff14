//! firewalld service rules

use hostprov_exec::{CommandResult, quote};

use crate::error::HostError;

fn scope(permanent: bool) -> &'static str {
    if permanent { "--permanent " } else { "" }
}

pub(crate) fn query_cmd(service: &str, permanent: bool) -> String {
    format!(
        "firewall-cmd {}--query-service={}",
        scope(permanent),
        quote(service)
    )
}

pub(crate) fn add_cmd(service: &str, permanent: bool) -> String {
    format!(
        "firewall-cmd {}--add-service={}",
        scope(permanent),
        quote(service)
    )
}

/// `--query-service` exits 0 for yes and 1 for no; anything else
/// (e.g. 252 when firewalld is not running) is a failure
pub(crate) fn parse_query(cmd: &str, result: &CommandResult) -> Result<bool, HostError> {
    match result.status {
        0 => Ok(true),
        1 => Ok(false),
        status => Err(HostError::CommandFailed {
            command: cmd.to_string(),
            status,
            stderr: result.combined_output().trim().to_string(),
        }),
    }
}
