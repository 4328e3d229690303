//! Site configuration management for `phantom.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── deploy     # [deploy]
//! │   ├── mirror     # [mirror]
//! │   ├── serve      # [serve]
//! │   └── site       # [site]
//! ├── error          # ConfigError
//! ├── util           # Config discovery, address validation
//! └── mod.rs         # SiteConfig (this file)
//! ```
//!
//! The file is optional. Values are layered: built-in defaults, then
//! `phantom.toml`, then command-line flags.

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::{DeployConfig, MirrorConfig, ServeConfig, SiteSectionConfig};

use util::{find_config_file, validate_address};

use crate::{
    cli::{Cli, Commands},
    log,
    utils::path::{expand_dir, expand_tilde, normalize_path},
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing phantom.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute path to the config file, when one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Directory relative paths in the file resolve against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub site: SiteSectionConfig,

    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub deploy: DeployConfig,
}

impl SiteConfig {
    /// Load configuration for the parsed command line.
    ///
    /// Searches upward from cwd for the config file. Without one the
    /// defaults apply and relative paths resolve against cwd.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
                config.config_path = Some(normalize_path(&path));
                config
            }
            None => Self {
                root: cwd,
                ..Self::default()
            },
        };

        config.normalize_paths();
        config.apply_command_options(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
            if !crate::cli::common::confirm("Continue?")? {
                bail!("Aborted due to unknown config fields");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        eprintln!();
        log!("warning"; "unknown fields in {}:", display_path);
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    /// Absolute mirror directory.
    pub fn output_dir(&self) -> &Path {
        &self.site.dir
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        // CLI paths resolve against cwd, not the config file
        if let Some(dir) = &cli.dir {
            self.site.dir = expand_dir(dir);
        }

        match &cli.command {
            Commands::Generate {
                domain,
                public,
                level,
            } => {
                Self::update_option(&mut self.site.source, domain.as_ref());
                if public.is_some() {
                    self.site.public.clone_from(public);
                }
                Self::update_option(&mut self.mirror.level, level.as_ref());
            }
            Commands::Preview { interface, port } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
            Commands::Setup { gh_repo } => {
                if gh_repo.is_some() {
                    self.deploy.url.clone_from(gh_repo);
                }
            }
            Commands::Deploy { .. } | Commands::AddDomain { .. } => {}
        }

        // `source` is substituted verbatim, a trailing slash would survive it
        trim_trailing_slash(&mut self.site.source);
        if let Some(public) = &mut self.site.public {
            trim_trailing_slash(public);
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Resolve the file's mirror directory against the config root.
    fn normalize_paths(&mut self) {
        let dir = expand_tilde(&self.site.dir);
        let dir = if dir.is_relative() {
            self.root.join(dir)
        } else {
            dir
        };
        self.site.dir = normalize_path(&dir);
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate addresses and required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address("site.source", &self.site.source)?;
        if let Some(public) = &self.site.public {
            validate_address("site.public", public)?;
        }
        if self.mirror.wget.trim().is_empty() {
            return Err(ConfigError::Validation("mirror.wget is empty".into()));
        }
        if self.deploy.git.trim().is_empty() {
            return Err(ConfigError::Validation("deploy.git is empty".into()));
        }
        if self.deploy.branch.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(ConfigError::Validation("deploy.branch is empty".into()));
        }
        Ok(())
    }
}

fn trim_trailing_slash(address: &mut String) {
    let trimmed = address.trim_end_matches('/').len();
    address.truncate(trimmed);
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let (parsed, ignored) = SiteConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
