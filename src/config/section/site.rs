//! `[site]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [site]
//! source = "http://localhost:2368"      # Address of the running blog
//! public = "https://blog.example.com"   # Address the mirror is served from
//! dir = "static"                        # Mirror directory (relative to this file)
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a local Ghost install listens by default.
pub const DEFAULT_SOURCE: &str = "http://localhost:2368";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSectionConfig {
    /// Address the mirror is downloaded from.
    pub source: String,

    /// Public address substituted for `source`. No substitution when unset.
    pub public: Option<String>,

    /// Mirror directory.
    pub dir: PathBuf,
}

impl Default for SiteSectionConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            public: None,
            dir: PathBuf::from("static"),
        }
    }
}
