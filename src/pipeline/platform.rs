//! Platform-dependent pipeline settings.
//!
//! The mirror names files differently depending on the host: wget's
//! `--restrict-file-name=windows` maps `?` to `@`, the unix mode to `#`.
//! Link conversion is also unavailable on windows and is replaced by a
//! fix-up in the normalizer.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    /// Platform the binary was built for.
    pub const fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }

    /// Value for wget's `--restrict-file-name`.
    pub const fn restrict_file_name(self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.restrict_file_name())
    }
}

/// Settings resolved once at start and passed to every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub platform: Platform,
    /// Character standing in for `?` in mirrored file names.
    pub query_separator: char,
    /// Whether wget rewrote links itself (`--convert-links`).
    pub convert_links: bool,
}

impl PipelineConfig {
    pub const fn detect() -> Self {
        Self::for_platform(Platform::current())
    }

    pub const fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Unix => Self {
                platform,
                query_separator: '#',
                convert_links: true,
            },
            Platform::Windows => Self {
                platform,
                query_separator: '@',
                convert_links: false,
            },
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_platform() {
        let unix = PipelineConfig::for_platform(Platform::Unix);
        assert_eq!(unix.query_separator, '#');
        assert!(unix.convert_links);

        let windows = PipelineConfig::for_platform(Platform::Windows);
        assert_eq!(windows.query_separator, '@');
        assert!(!windows.convert_links);
        assert_eq!(windows.platform.restrict_file_name(), "windows");
    }

    #[test]
    fn test_detect_matches_build_target() {
        let config = PipelineConfig::detect();
        assert_eq!(config.platform == Platform::Windows, cfg!(windows));
    }
}
