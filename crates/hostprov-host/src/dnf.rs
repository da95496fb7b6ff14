//! DNF package manager (Fedora/RHEL/CentOS)
//!
//! Installed-ness is answered by `rpm -q`, which is cheap and never touches
//! repository metadata.

use hostprov_exec::quote;

/// Exits 0 when the package is installed
pub(crate) fn query_cmd(name: &str) -> String {
    format!("rpm -q --quiet {}", quote(name))
}

/// Install all of `names` in one transaction
pub(crate) fn install_cmd(names: &[String]) -> String {
    let args: Vec<String> = names.iter().map(|n| quote(n)).collect();
    format!("dnf install -y {}", args.join(" "))
}

/// Extract package names dnf could not resolve.
///
/// Handles both the per-argument form (`No match for argument: foo`) and
/// the summary form (`Error: Unable to find a match: foo bar`).
#[must_use]
pub fn parse_missing_packages(output: &str) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();

    for line in output.lines() {
        let names = if let Some(idx) = line.find("No match for argument:") {
            &line[idx + "No match for argument:".len()..]
        } else if let Some(idx) = line.find("Unable to find a match:") {
            &line[idx + "Unable to find a match:".len()..]
        } else {
            continue;
        };

        for name in names.split_whitespace() {
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
    }

    missing
}
