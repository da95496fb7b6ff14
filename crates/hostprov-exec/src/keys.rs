//! SSH key resolution

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

/// Where the SSH private key for the target host comes from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Explicit path to key file
    Path(PathBuf),
    /// Base64-encoded key held in an environment variable
    Env(String),
}

impl KeySource {
    /// Resolve key source to a readable key file
    ///
    /// For `Env`, decodes base64 and writes a private temp file that is
    /// removed when the `ResolvedKey` is dropped.
    ///
    /// # Errors
    /// Returns `KeyError` if the file is missing or too open, the variable
    /// is unset, or its contents are not valid base64
    pub fn resolve(&self) -> Result<ResolvedKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                validate_key_permissions(path)?;
                Ok(ResolvedKey::Path(path.clone()))
            }
            KeySource::Env(var_name) => {
                let encoded =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&encoded).map_err(|_| KeyError::InvalidBase64)?;
                Ok(ResolvedKey::Temp(write_temp_key(&key_data)?))
            }
        }
    }
}

/// Resolved key location
#[derive(Debug)]
pub enum ResolvedKey {
    /// Path to key file
    Path(PathBuf),
    /// Private temporary file, deleted on drop
    Temp(NamedTempFile),
}

impl ResolvedKey {
    /// Path to hand to the SSH library
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ResolvedKey::Path(p) => p,
            ResolvedKey::Temp(f) => f.path(),
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeyError::NotFound(path.display().to_string()),
        _ => KeyError::Io(e),
    })?;

    // group and other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

/// Write the key to a fresh file with a random name.
///
/// The file is created exclusively with mode 0600, so a pre-planted file
/// or symlink is never followed.
fn write_temp_key(key_data: &[u8]) -> Result<NamedTempFile, KeyError> {
    let mut file = tempfile::Builder::new()
        .prefix("hostprov_ssh_key_")
        .tempfile()?;
    file.write_all(key_data)?;
    file.flush()?;

    debug!(path = %file.path().display(), "wrote temporary SSH key");

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_file() {
        let source = KeySource::Path(PathBuf::from("/nonexistent/id_ed25519"));
        assert!(matches!(source.resolve(), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_unset_env_var() {
        let source = KeySource::Env("HOSTPROV_TEST_KEY_THAT_IS_NOT_SET".to_string());
        assert!(matches!(source.resolve(), Err(KeyError::EnvNotSet(_))));
    }

    #[test]
    fn test_temp_key_is_private_and_removed() {
        use std::os::unix::fs::PermissionsExt;

        let key = ResolvedKey::Temp(write_temp_key(b"KEYDATA").unwrap());
        let path = key.path().to_path_buf();

        assert_eq!(std::fs::read(&path).unwrap(), b"KEYDATA");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        drop(key);
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_keys_never_share_a_path() {
        let first = write_temp_key(b"a").unwrap();
        let second = write_temp_key(b"b").unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_temp_key_leaves_planted_symlink_target_alone() {
        let dir = tempfile::tempdir().unwrap();
        let victim = dir.path().join("victim");
        std::fs::write(&victim, "untouched").unwrap();
        let planted = std::env::temp_dir().join(format!("hostprov_ssh_key_{}", std::process::id()));
        let _ = std::fs::remove_file(&planted);
        std::os::unix::fs::symlink(&victim, &planted).unwrap();

        let key = write_temp_key(b"KEYDATA").unwrap();
        drop(key);

        assert_eq!(std::fs::read_to_string(&victim).unwrap(), "untouched");
        std::fs::remove_file(&planted).unwrap();
    }

    #[test]
    fn test_base64_decode_trims_whitespace() {
        assert_eq!(base64_decode("aGVsbG8=\n").unwrap(), b"hello");
    }
}
