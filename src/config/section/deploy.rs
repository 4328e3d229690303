//! `[deploy]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [deploy]
//! url = "git@github.com:user/user.github.io.git"  # Used by `setup` when --gh-repo is omitted
//! branch = "master"                               # Overrides the GitHub Pages default
//! git = "git"                                     # git executable name or path
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Repository URL (HTTPS or SSH format).
    pub url: Option<String>,

    /// Publishing branch. Derived from `url` when unset.
    pub branch: Option<String>,

    pub git: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            url: None,
            branch: None,
            git: "git".to_string(),
        }
    }
}
