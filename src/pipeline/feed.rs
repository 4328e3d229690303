//! Feed conversion.
//!
//! The mirror stores every feed as `…/rss/index.html`, which a static host
//! would serve as a web page. Each one gets an `index.rss` sibling holding the
//! same document parsed as XML, with its links rewritten.

use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::{
    PipelineError,
    links::rewrite_document,
    rules::FEED_EXTENSION,
    tree::{Dialect, MirrorTree, remove_if_exists},
};
use crate::debug;

/// Directory name marking a feed location.
pub const FEED_DIR: &str = "rss";

const FEED_SOURCE: &str = "index.html";

/// Convert every feed in the tree, returning how many were written.
pub fn convert_feeds(tree: &MirrorTree) -> Result<usize, PipelineError> {
    let feeds = feed_dirs(tree)?;

    feeds
        .par_iter()
        .map(|dir| convert_feed(tree, dir))
        .collect::<Result<Vec<_>, _>>()
        .map(|written| written.len())
}

/// Directories below a `rss` component that hold an `index.html`, relative
/// to the root.
fn feed_dirs(tree: &MirrorTree) -> Result<Vec<PathBuf>, PipelineError> {
    Ok(tree
        .dirs()?
        .iter()
        .filter(|dir| dir.join(FEED_SOURCE).is_file())
        .filter_map(|dir| tree.relative(dir))
        .filter(|rel| rel.components().any(|c| c.as_os_str() == FEED_DIR))
        .map(Path::to_path_buf)
        .collect())
}

fn convert_feed(tree: &MirrorTree, dir: &Path) -> Result<PathBuf, PipelineError> {
    let source = tree.resolve(dir.join(FEED_SOURCE))?;
    let target = tree.resolve(dir.join(format!("index.{FEED_EXTENSION}")))?;

    let bytes = fs::read(&source).map_err(|e| PipelineError::io(&source, e))?;
    let converted = match std::str::from_utf8(&bytes) {
        Ok(text) => rewrite_document(text, Dialect::Xml).text.into_bytes(),
        // Undecodable feeds are republished as-is
        Err(_) => bytes,
    };

    remove_if_exists(&target)?;
    fs::write(&target, converted).map_err(|e| PipelineError::io(&target, e))?;
    debug!("feed"; "{}", target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_converts_nested_feeds() {
        let dir = TempDir::new().unwrap();
        write(&dir, "rss/index.html", "<rss><channel/></rss>");
        write(&dir, "rss/tag/news/rss/index.html", "<rss/>");
        write(&dir, "rss/feed.rss", "raw");
        write(&dir, "tag/news/index.html", "<html/>");

        let tree = MirrorTree::open(dir.path()).unwrap();
        assert_eq!(convert_feeds(&tree).unwrap(), 2);

        let top = fs::read_to_string(dir.path().join("rss/index.rss")).unwrap();
        assert!(top.starts_with("<?xml"));
        assert!(top.ends_with("<rss><channel/></rss>"));
        assert!(dir.path().join("rss/tag/news/rss/index.rss").exists());
        assert!(!dir.path().join("tag/news/index.rss").exists());

        // Source pages stay in place
        assert!(dir.path().join("rss/index.html").exists());
    }

    #[test]
    fn test_feed_links_retargeted() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "rss/index.html",
            r#"<rss><atom:link href="http://localhost:2368/rss/" rel="self"/></rss>"#,
        );

        let tree = MirrorTree::open(dir.path()).unwrap();
        convert_feeds(&tree).unwrap();

        let feed = fs::read_to_string(dir.path().join("rss/index.rss")).unwrap();
        assert!(feed.contains(r#"href="http://localhost:2368/rss/index.rss""#));
    }

    #[test]
    fn test_empty_feed_stays_empty() {
        let dir = TempDir::new().unwrap();
        write(&dir, "rss/index.html", "");
        write(&dir, "rss/index.rss", "stale");

        let tree = MirrorTree::open(dir.path()).unwrap();
        assert_eq!(convert_feeds(&tree).unwrap(), 1);
        assert_eq!(fs::read(dir.path().join("rss/index.rss")).unwrap(), b"");
    }

    #[test]
    fn test_no_feeds() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.html", "<html/>");
        let tree = MirrorTree::open(dir.path()).unwrap();
        assert_eq!(convert_feeds(&tree).unwrap(), 0);
    }
}
