//! Filename normalization.
//!
//! The mirror saves `style.css?v=1a2b` as `style.css#v=1a2b` (`@` on windows).
//! Those duplicates collapse onto their canonical name, and extensionless
//! static pages in the root and `tag/` get `.html` so a static host serves
//! them with the right content type.
//!
//! Runs sequentially: renames from different variants race on one
//! destination.

use regex::Regex;
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use super::{
    PipelineError,
    platform::PipelineConfig,
    rules::PAGE_EXTENSION,
    tree::{MirrorTree, replace_file, write_if_changed},
};
use crate::debug;

/// Top-level directory whose extensionless entries are pages.
const TAG_DIR: &str = "tag";

/// Placeholder wget leaves where the source address must survive the fix-up.
const ADDRESS_PLACEHOLDER: &str = "%hurl";

/// Extensionless files that are not pages (`CNAME` is written by `add-domain`).
const PRESERVED_NAMES: &[&str] = &["CNAME"];

static STATIC_PAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w-]+$").unwrap());

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Query-suffixed files moved onto their canonical name.
    pub deduplicated: usize,
    /// Static pages given the `.html` extension.
    pub extended: usize,
    /// Pages whose absolute source links were made root-relative.
    pub relativized: usize,
}

/// Normalize every file name in the tree.
///
/// `source` is only consulted when the mirror could not convert links.
pub fn normalize(
    tree: &MirrorTree,
    config: &PipelineConfig,
    source: &str,
) -> Result<NormalizeReport, PipelineError> {
    let mut report = NormalizeReport::default();

    if !config.convert_links {
        report.relativized = relativize_source_links(tree, source)?;
    }

    for path in tree.files_excluding_vcs()? {
        // An earlier variant already took this slot
        if !path.exists() {
            continue;
        }
        let Some(canonical) = canonical_path(&path, config.query_separator) else {
            continue;
        };
        debug!("normalize"; "{} -> {}", display_name(&path), display_name(&canonical));
        replace_file(&path, &canonical)?;
        report.deduplicated += 1;
    }

    for path in tree.files_excluding_vcs()? {
        if !is_static_page(tree, &path) {
            continue;
        }
        let mut extended = path.clone().into_os_string();
        extended.push(".");
        extended.push(PAGE_EXTENSION);
        let extended = PathBuf::from(extended);

        debug!("normalize"; "{} -> {}", display_name(&path), display_name(&extended));
        replace_file(&path, &extended)?;
        report.extended += 1;
    }

    Ok(report)
}

/// Path with the file name truncated at the query separator.
///
/// `None` when the name carries no separator, or nothing is left before it.
fn canonical_path(path: &Path, separator: char) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let (canonical, _query) = name.split_once(separator)?;
    if canonical.is_empty() {
        return None;
    }
    Some(path.with_file_name(canonical))
}

/// Extensionless page directly in the root or in `tag/`.
fn is_static_page(tree: &MirrorTree, path: &Path) -> bool {
    let Some(relative) = tree.relative(path) else {
        return false;
    };
    let in_page_dir = match relative.parent() {
        Some(parent) => parent.as_os_str().is_empty() || parent == Path::new(TAG_DIR),
        None => false,
    };
    in_page_dir
        && relative
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| STATIC_PAGE.is_match(name) && !PRESERVED_NAMES.contains(&name))
}

/// Strip the source address from pages the mirror left with absolute links.
fn relativize_source_links(tree: &MirrorTree, source: &str) -> Result<usize, PipelineError> {
    if source.is_empty() {
        return Ok(0);
    }

    let mut changed = 0;
    for path in tree.pages()? {
        let bytes = fs::read(&path).map_err(|e| PipelineError::io(&path, e))?;
        let Ok(text) = std::str::from_utf8(&bytes) else {
            debug!("normalize"; "skipping undecodable {}", display_name(&path));
            continue;
        };
        let fixed = text
            .replace(source, "")
            .replace(ADDRESS_PLACEHOLDER, source);
        if write_if_changed(&path, &bytes, fixed.as_bytes())? {
            changed += 1;
        }
    }
    Ok(changed)
}

fn display_name(path: &Path) -> std::borrow::Cow<'_, str> {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), OsStr::to_string_lossy)
}
