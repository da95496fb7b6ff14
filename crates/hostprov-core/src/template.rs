//! Template rendering with minijinja

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};

use crate::error::CoreError;

/// systemd unit for the application; takes `node_path` and `xo_path`
pub const SERVICE_UNIT: &str = include_str!("../templates/xo-server.service.j2");

/// Render `source` with `vars`.
///
/// Undefined variables are an error rather than an empty string, and a
/// trailing newline in the template is kept.
///
/// # Errors
/// Returns `CoreError::Template` on syntax errors or undefined variables
pub fn render(source: &str, vars: &BTreeMap<String, String>) -> Result<String, CoreError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);

    let template = env.template_from_str(source)?;
    Ok(template.render(vars)?)
}
