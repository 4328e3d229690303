//! URL to mirror path resolution.

use std::path::{Path, PathBuf};

use crate::utils::path::split_path_fragment;

/// Resolve a request URL to a file under `root`.
///
/// Directories resolve to their `index.html`. Anything that escapes `root`,
/// directly or through a symlink, resolves to `None`.
pub fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let canonical = root.join(&clean).canonicalize().ok()?;
    let root = root.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Decode, drop query string and fragment, trim slashes.
fn normalize_url(url: &str) -> String {
    let (path, _) = split_path_fragment(url);
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}
