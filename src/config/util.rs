//! Configuration utility functions.

use std::path::{Path, PathBuf};

use super::ConfigError;

/// Check that `value` is an absolute web address with a host.
///
/// Uses `url` crate for parsing, so ports and auth info are accepted:
/// - `http://localhost:2368` -> ok
/// - `https://user@blog.example.com:8443` -> ok
/// - `localhost:2368` -> error (no scheme)
/// - `file:///srv/blog` -> error (no host)
pub fn validate_address(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{field} `{value}` is not a URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "{field} `{value}` must use http or https"
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::Validation(format!(
            "{field} `{value}` has no host"
        )));
    }
    Ok(())
}

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`
/// Returns the absolute path to the config file if found
///
/// # Example
/// ```text
/// /home/user/blog/static/tag/  ← cwd
/// /home/user/blog/phantom.toml ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_from(&cwd, config_name)
}

fn find_config_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    // Walk up from start looking for config file
    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None, // Reached filesystem root
        }
    }
}

// ============================================================================
// tests
// ============================================================================
