//! Run variables and target host settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Variables the playbook is rendered from.
///
/// Supplied before the run starts and read-only while it executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vars {
    /// Inventory hostname; becomes the system hostname and the public URL
    pub hostname: String,
    /// Checkout and install directory of the application
    #[serde(default = "default_xo_path")]
    pub xo_path: String,
    /// Git repository to clone
    #[serde(default = "default_xo_repo")]
    pub xo_repo: String,
    /// Branch or tag to check out
    #[serde(default = "default_xo_version")]
    pub xo_version: String,
    /// Directory holding `config.toml`
    #[serde(default = "default_xo_config_dir")]
    pub xo_config_dir: String,
    #[serde(default = "default_root")]
    pub xo_config_owner: String,
    #[serde(default = "default_root")]
    pub xo_config_group: String,
    /// Port the application listens on
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// TLS certificate path on the host
    #[serde(default = "default_xo_cert")]
    pub xo_cert: String,
    /// TLS private key path on the host
    #[serde(default = "default_xo_key")]
    pub xo_key: String,
    /// nvm release whose install script is fetched
    #[serde(default = "default_nvm_version")]
    pub nvm_version: String,
    /// Where the nvm install script is downloaded to
    #[serde(default = "default_nvm_script_path")]
    pub nvm_script_path: String,
    /// systemd unit name of the application
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Cache/queue service started alongside the firewall
    #[serde(default = "default_cache_service")]
    pub cache_service: String,
    /// OS packages to install
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
}

fn default_xo_path() -> String {
    "/opt/xen-orchestra".to_string()
}

fn default_xo_repo() -> String {
    "https://github.com/vatesfr/xen-orchestra".to_string()
}

fn default_xo_version() -> String {
    "master".to_string()
}

fn default_xo_config_dir() -> String {
    "/etc/xo-server".to_string()
}

fn default_root() -> String {
    "root".to_string()
}

fn default_http_port() -> u16 {
    443
}

fn default_xo_cert() -> String {
    "/etc/pki/tls/certs/xo-server.crt".to_string()
}

fn default_xo_key() -> String {
    "/etc/pki/tls/private/xo-server.key".to_string()
}

fn default_nvm_version() -> String {
    "v0.40.1".to_string()
}

fn default_nvm_script_path() -> String {
    "/tmp/nvm-install.sh".to_string()
}

fn default_service_name() -> String {
    "xo-server".to_string()
}

fn default_cache_service() -> String {
    "redis".to_string()
}

fn default_packages() -> Vec<String> {
    [
        "redis",
        "libpng-devel",
        "git",
        "curl",
        "lvm2",
        "cifs-utils",
        "nfs-utils",
        "ntfs-3g",
        "make",
        "automake",
        "gcc",
        "gcc-c++",
        "openssl",
        "firewalld",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Vars {
    /// Defaults for everything except the hostname
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            xo_path: default_xo_path(),
            xo_repo: default_xo_repo(),
            xo_version: default_xo_version(),
            xo_config_dir: default_xo_config_dir(),
            xo_config_owner: default_root(),
            xo_config_group: default_root(),
            http_port: default_http_port(),
            xo_cert: default_xo_cert(),
            xo_key: default_xo_key(),
            nvm_version: default_nvm_version(),
            nvm_script_path: default_nvm_script_path(),
            service_name: default_service_name(),
            cache_service: default_cache_service(),
            packages: default_packages(),
        }
    }

    /// Path of the application config file
    #[must_use]
    pub fn xo_config_path(&self) -> String {
        format!("{}/config.toml", self.xo_config_dir.trim_end_matches('/'))
    }

    /// Path of the rendered systemd unit
    #[must_use]
    pub fn unit_path(&self) -> String {
        format!("/etc/systemd/system/{}.service", self.service_name)
    }

    /// Apply a `key=value` override.
    ///
    /// The value is read as JSON when that yields something the key
    /// accepts (`http_port=8443`, `packages=["git"]`), and as a plain
    /// string otherwise.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the assignment is malformed, the key
    /// is unknown, or the value does not fit the key
    pub fn set(&mut self, assignment: &str) -> Result<(), CoreError> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| CoreError::Config(format!("expected key=value, got {assignment:?}")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CoreError::Config(format!("empty key in {assignment:?}")));
        }

        let mut map = match serde_json::to_value(&*self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return Err(CoreError::Config("variables are not a map".to_string())),
        };
        if !map.contains_key(key) {
            return Err(CoreError::Config(format!("unknown variable {key:?}")));
        }

        let candidates = [
            serde_json::from_str::<serde_json::Value>(raw).ok(),
            Some(serde_json::Value::String(raw.to_string())),
        ];

        let mut last_err = None;
        for value in candidates.into_iter().flatten() {
            map.insert(key.to_string(), value);
            match serde_json::from_value::<Vars>(serde_json::Value::Object(map.clone())) {
                Ok(vars) => {
                    *self = vars;
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(CoreError::Config(format!(
            "cannot set {key}: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Check values the playbook relies on
    ///
    /// # Errors
    /// Returns `CoreError::Config` naming the first invalid variable
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.hostname.trim().is_empty() {
            return Err(CoreError::Config("hostname must not be empty".to_string()));
        }
        if self.http_port == 0 {
            return Err(CoreError::Config("http_port must not be 0".to_string()));
        }
        if self.packages.is_empty() {
            return Err(CoreError::Config("packages must not be empty".to_string()));
        }

        let paths = [
            ("xo_path", &self.xo_path),
            ("xo_config_dir", &self.xo_config_dir),
            ("xo_cert", &self.xo_cert),
            ("xo_key", &self.xo_key),
            ("nvm_script_path", &self.nvm_script_path),
        ];
        for (name, path) in paths {
            if !path.starts_with('/') {
                return Err(CoreError::Config(format!(
                    "{name} must be an absolute path, got {path:?}"
                )));
            }
        }

        Ok(())
    }
}

/// How to reach the host being provisioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Address for SSH; `localhost` provisions the local machine
    #[serde(default = "default_addr")]
    pub addr: String,
    /// SSH user
    #[serde(default = "default_root")]
    pub user: String,
    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Path to SSH private key
    pub ssh_key: Option<String>,
    /// Environment variable holding a base64-encoded private key
    pub ssh_key_env: Option<String>,
    /// Run commands through sudo; detected from the login user when unset
    pub sudo: Option<bool>,
    /// Upper bound for any single command
    pub command_timeout_secs: Option<u64>,
}

fn default_addr() -> String {
    "localhost".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            user: default_root(),
            port: default_ssh_port(),
            ssh_key: None,
            ssh_key_env: None,
            sudo: None,
            command_timeout_secs: None,
        }
    }
}

impl TargetConfig {
    /// Whether commands run on this machine instead of over SSH
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.addr.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// Per-command timeout, if configured
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let mut vars = Vars::new("xo.lan");
        vars.xo_config_dir = "/etc/xo-server/".to_string();

        assert_eq!(vars.xo_config_path(), "/etc/xo-server/config.toml");
        assert_eq!(vars.unit_path(), "/etc/systemd/system/xo-server.service");
    }

    #[test]
    fn test_set_typed_values() {
        let mut vars = Vars::new("xo.lan");

        vars.set("http_port=8443").unwrap();
        vars.set("packages=[\"git\",\"redis\"]").unwrap();
        vars.set("xo_version=5.160.0").unwrap();

        assert_eq!(vars.http_port, 8443);
        assert_eq!(vars.packages, vec!["git", "redis"]);
        assert_eq!(vars.xo_version, "5.160.0");
    }

    #[test]
    fn test_set_numeric_looking_string() {
        let mut vars = Vars::new("xo.lan");
        vars.set("hostname=1234").unwrap();
        assert_eq!(vars.hostname, "1234");
    }

    #[test]
    fn test_set_unknown_key_is_rejected() {
        let mut vars = Vars::new("xo.lan");
        let err = vars.set("http_prot=8443").unwrap_err();
        assert!(err.to_string().contains("unknown variable \"http_prot\""));
        assert_eq!(vars, Vars::new("xo.lan"));
    }

    #[test]
    fn test_unknown_field_in_config_is_rejected() {
        let err = serde_json::from_value::<Vars>(serde_json::json!({
            "hostname": "xo.lan",
            "datacenter": "ams1",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown field `datacenter`"));
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut vars = Vars::new("xo.lan");
        assert!(matches!(vars.set("http_port=https"), Err(CoreError::Config(_))));
        assert!(matches!(vars.set("no-equals-sign"), Err(CoreError::Config(_))));
        assert_eq!(vars.http_port, 443);
    }

    #[test]
    fn test_validate() {
        assert!(Vars::new("xo.lan").validate().is_ok());
        assert!(Vars::new("  ").validate().is_err());

        let mut vars = Vars::new("xo.lan");
        vars.xo_cert = "cert.pem".to_string();
        let err = vars.validate().unwrap_err();
        assert!(err.to_string().contains("xo_cert"));
    }

    #[test]
    fn test_target_defaults_to_local() {
        let target = TargetConfig::default();
        assert!(target.is_local());
        assert_eq!(target.command_timeout(), None);
    }
}
