//! `[mirror]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [mirror]
//! level = 0        # wget recursion depth, 0 is infinite
//! wget = "wget"    # wget executable name or path
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub level: u32,
    pub wget: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            level: 0,
            wget: "wget".to_string(),
        }
    }
}
