//! The mirrored site on disk.
//!
//! Every pass addresses files through a [`MirrorTree`], which owns the root
//! directory and refuses paths that would leave it.

use jwalk::WalkDir;
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use super::PipelineError;

/// Version-control metadata directory, never touched by the pipeline.
pub const VCS_DIR: &str = ".git";

/// Markup dialect a page is parsed and serialized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Html,
    Xml,
}

impl Dialect {
    /// Pages directly inside a directory named `rss` are feeds.
    pub fn for_path(path: &Path) -> Self {
        let in_feed_dir = path
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|name| name == "rss");
        if in_feed_dir { Self::Xml } else { Self::Html }
    }
}

/// A markup file loaded for a single pass.
#[derive(Debug)]
pub struct PageFile {
    /// Path relative to the tree root.
    pub path: PathBuf,
    pub dialect: Dialect,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MirrorTree {
    root: PathBuf,
}

impl MirrorTree {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PipelineError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize().map_err(|e| PipelineError::io(root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a relative path onto the root.
    ///
    /// Rejects absolute paths and any `..` component.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, PipelineError> {
        let relative = relative.as_ref();
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(PipelineError::Escape(relative.to_path_buf()));
        }
        Ok(self.root.join(relative))
    }

    /// Strip the root from an absolute path inside the tree.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }

    /// All regular files outside version-control metadata, sorted by path.
    pub fn files_excluding_vcs(&self) -> Result<Vec<PathBuf>, PipelineError> {
        self.walk(true)
    }

    /// All directories below the root, sorted by path.
    pub fn dirs(&self) -> Result<Vec<PathBuf>, PipelineError> {
        self.walk(false)
    }

    /// Mirrored pages handled by the link rewriter.
    pub fn pages(&self) -> Result<Vec<PathBuf>, PipelineError> {
        Ok(self
            .files_excluding_vcs()?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
            .collect())
    }

    pub fn read_page(&self, path: &Path) -> Result<PageFile, PipelineError> {
        let content = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        let relative = self.relative(path).unwrap_or(path).to_path_buf();
        Ok(PageFile {
            dialect: Dialect::for_path(&relative),
            path: relative,
            content,
        })
    }

    fn walk(&self, want_files: bool) -> Result<Vec<PathBuf>, PipelineError> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root).skip_hidden(false).sort(true) {
            let entry = entry.map_err(|e| PipelineError::Walk {
                path: self.root.clone(),
                message: e.to_string(),
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path();
            if self.is_vcs_path(&path) {
                continue;
            }

            let file_type = entry.file_type();
            let keep = if want_files {
                file_type.is_file()
            } else {
                file_type.is_dir()
            };
            if keep {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    fn is_vcs_path(&self, path: &Path) -> bool {
        self.relative(path)
            .is_some_and(|rel| rel.components().any(|c| c.as_os_str() == VCS_DIR))
    }
}

// ============================================================================
// File operations shared by the passes
// ============================================================================

/// Remove a file, treating "not found" as success.
pub fn remove_if_exists(path: &Path) -> Result<(), PipelineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(path, e)),
    }
}

/// Move `from` onto `to`, replacing whatever is there.
pub fn replace_file(from: &Path, to: &Path) -> Result<(), PipelineError> {
    remove_if_exists(to)?;
    fs::rename(from, to).map_err(|e| PipelineError::io(from, e))
}

/// Write `content` to `path` only if it differs from `previous`.
pub fn write_if_changed(path: &Path, previous: &[u8], content: &[u8]) -> Result<bool, PipelineError> {
    if previous == content {
        return Ok(false);
    }
    fs::write(path, content).map_err(|e| PipelineError::io(path, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree_with(files: &[&str]) -> (TempDir, MirrorTree) {
        let dir = TempDir::new().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, file).unwrap();
        }
        let tree = MirrorTree::open(dir.path()).unwrap();
        (dir, tree)
    }

    #[test]
    fn test_open_rejects_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            MirrorTree::open(&missing),
            Err(PipelineError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_resolve_stays_inside_root() {
        let (_dir, tree) = tree_with(&[]);
        assert!(tree.resolve("tag/rust.html").is_ok());
        assert!(tree.resolve("./about.html").is_ok());
        assert!(matches!(
            tree.resolve("../outside"),
            Err(PipelineError::Escape(_))
        ));
        assert!(matches!(
            tree.resolve("/etc/passwd"),
            Err(PipelineError::Escape(_))
        ));
    }

    #[test]
    fn test_files_sorted_and_vcs_excluded() {
        let (_dir, tree) = tree_with(&["b.html", "a.html", ".git/config", "tag/x.html"]);

        assert!(tree.root().join(".git/config").is_file());

        let visible: Vec<_> = tree
            .files_excluding_vcs()
            .unwrap()
            .iter()
            .map(|p| tree.relative(p).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            visible,
            vec![
                PathBuf::from("a.html"),
                PathBuf::from("b.html"),
                PathBuf::from("tag/x.html"),
            ]
        );
    }

    #[test]
    fn test_pages_only_html() {
        let (_dir, tree) = tree_with(&["index.html", "screen.css", "rss/index.html"]);
        assert_eq!(tree.pages().unwrap().len(), 2);
    }

    #[test]
    fn test_dialect_for_path() {
        assert_eq!(Dialect::for_path(Path::new("rss/index.html")), Dialect::Xml);
        assert_eq!(
            Dialect::for_path(Path::new("rss/tag/news/rss/index.html")),
            Dialect::Xml
        );
        assert_eq!(Dialect::for_path(Path::new("index.html")), Dialect::Html);
        assert_eq!(Dialect::for_path(Path::new("rss/tag/a.html")), Dialect::Html);
    }

    #[test]
    fn test_read_page_detects_dialect() {
        let (_dir, tree) = tree_with(&["rss/index.html"]);
        let path = tree.resolve("rss/index.html").unwrap();
        let page = tree.read_page(&path).unwrap();
        assert_eq!(page.path, PathBuf::from("rss/index.html"));
        assert_eq!(page.dialect, Dialect::Xml);
        assert_eq!(page.content, b"rss/index.html");
    }

    #[test]
    fn test_remove_if_exists_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        assert!(remove_if_exists(&dir.path().join("missing")).is_ok());
    }

    #[test]
    fn test_replace_file_overwrites() {
        let (dir, _tree) = tree_with(&["a#1.css", "a.css"]);
        let from = dir.path().join("a#1.css");
        let to = dir.path().join("a.css");
        replace_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "a#1.css");
    }

    #[test]
    fn test_write_if_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.html");
        fs::write(&path, "same").unwrap();
        assert!(!write_if_changed(&path, b"same", b"same").unwrap());
        assert!(write_if_changed(&path, b"same", b"new").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
