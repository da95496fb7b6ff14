//! Configuration loading and types

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use hostprov_core::{TargetConfig, Vars};
use serde::{Deserialize, Serialize};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "HOSTPROV_CONFIG";

/// Top-level configuration for a provisioning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How to reach the host
    #[serde(default)]
    pub target: TargetConfig,
    /// Playbook variables; `hostname` is required here or via `-e`
    #[serde(default = "unset_vars")]
    pub vars: Vars,
    /// Log settings
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            vars: unset_vars(),
            log: LogConfig::default(),
        }
    }
}

fn unset_vars() -> Vars {
    Vars::new("")
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level or filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load `explicit`, else the first config found in the usual places,
    /// else defaults
    ///
    /// # Errors
    /// Returns error if a config file was found but cannot be loaded
    pub fn discover(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        for path in search_paths() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }

    /// Variables with `key=value` overrides applied, validated
    ///
    /// # Errors
    /// Returns error if an override is malformed or the result is invalid
    pub fn vars_with(&self, overrides: &[String]) -> eyre::Result<Vars> {
        let mut vars = self.vars.clone();
        for assignment in overrides {
            vars.set(assignment)?;
        }
        vars.validate()?;
        Ok(vars)
    }
}

/// Candidate config locations in lookup order
fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("hostprov.toml"),
        PathBuf::from("/etc/hostprov/hostprov.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("hostprov/hostprov.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
[target]
addr = "xo.lan"
user = "deploy"
ssh_key = "/home/deploy/.ssh/id_ed25519"
command_timeout_secs = 1800

[vars]
hostname = "xo.lan"
http_port = 8443

[log]
level = "debug"
json = true
"#;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.target.addr, "xo.lan");
        assert_eq!(config.target.user, "deploy");
        assert_eq!(config.target.port, 22);
        assert!(!config.target.is_local());
        assert_eq!(config.vars.hostname, "xo.lan");
        assert_eq!(config.vars.http_port, 8443);
        assert_eq!(config.vars.xo_path, "/opt/xen-orchestra");
        assert_eq!(config.log.level, "debug");
        assert!(config.log.json);
    }

    #[test]
    fn test_misspelled_var_is_rejected() {
        let err = toml::from_str::<Config>("[vars]\nhostname = \"xo.lan\"\nhttp_prot = 8443\n")
            .unwrap_err();
        assert!(err.to_string().contains("http_prot"));

        let config: Config = toml::from_str("").unwrap();
        let err = config
            .vars_with(&["hostname=xo.lan".to_string(), "datacenter=ams1".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("unknown variable"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert!(config.target.is_local());
        assert_eq!(config.log.level, "info");
        assert!(config.vars.hostname.is_empty());
    }

    #[test]
    fn test_overrides_supply_hostname() {
        let config = Config::default();
        assert!(config.vars_with(&[]).is_err());

        let vars = config
            .vars_with(&["hostname=xo.lan".to_string(), "xo_version=stable".to_string()])
            .unwrap();
        assert_eq!(vars.hostname, "xo.lan");
        assert_eq!(vars.xo_version, "stable");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::discover(Some(file.path())).unwrap();
        assert_eq!(config.target.command_timeout_secs, Some(1800));
    }

    #[test]
    fn test_load_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[target\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
