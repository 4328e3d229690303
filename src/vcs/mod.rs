//! Git operations for publishing the mirror.
//!
//! Everything goes through the `git` binary so the user's credentials,
//! hooks and config apply unchanged.

use regex::Regex;
use std::{
    path::{Path, PathBuf},
    process::Output,
    sync::LazyLock,
};
use thiserror::Error;

use crate::{
    exec, log,
    utils::{
        date::DateTime,
        exec::{Cmd, FilterRule},
    },
};

/// Remote the mirror is pushed to.
pub const REMOTE: &str = "origin";

/// Git noise that is not worth repeating to the user.
const GIT_FILTER: FilterRule = FilterRule::new(&["hint:", "Initialized empty Git repository"]);

/// User and organization pages are served from the default branch.
static USER_PAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w-]+\.github\.(?:io|com)").unwrap());

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("`{0}` not found, install git or set its path in the config")]
    MissingTool(String),

    #[error("{0}")]
    Command(String),

    #[error("`{}` is not a git repository, run `phantom setup` first", .0.display())]
    NotARepository(PathBuf),
}

fn command_error(e: anyhow::Error) -> VcsError {
    VcsError::Command(format!("{e:#}"))
}

/// Branch GitHub Pages serves for a repository URL.
pub fn pages_branch(url: &str) -> &'static str {
    if USER_PAGES.is_match(url) {
        "master"
    } else {
        "gh-pages"
    }
}

/// A working tree driven by the `git` CLI.
#[derive(Debug, Clone)]
pub struct Repo {
    git: PathBuf,
    root: PathBuf,
}

impl Repo {
    pub fn new(git: PathBuf, root: impl Into<PathBuf>) -> Self {
        Self {
            git,
            root: root.into(),
        }
    }

    pub fn locate(program: &str) -> Result<PathBuf, VcsError> {
        which::which(program).map_err(|_| VcsError::MissingTool(program.to_string()))
    }

    /// Open an existing working tree.
    pub fn open(git: PathBuf, root: impl Into<PathBuf>) -> Result<Self, VcsError> {
        let repo = Self::new(git, root);
        if !repo.root.join(".git").exists() {
            return Err(VcsError::NotARepository(repo.root));
        }
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn init(&self) -> Result<(), VcsError> {
        exec!(filter=&GIT_FILTER; &self.root; &self.git; "init").map_err(command_error)?;
        log!("git"; "initialized {}", self.root.display());
        Ok(())
    }

    /// Point the unborn `HEAD` at `branch`, whatever `init.defaultBranch` says.
    pub fn set_initial_branch(&self, branch: &str) -> Result<(), VcsError> {
        let target = format!("refs/heads/{branch}");
        self.git(&["symbolic-ref", "HEAD", &target]).map(drop)
    }

    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), VcsError> {
        self.git(&["remote", "add", name, url]).map(drop)
    }

    pub fn add_all(&self) -> Result<(), VcsError> {
        exec!(&self.root; &self.git; "add", ".")
            .map(drop)
            .map_err(command_error)
    }

    /// Whether the index or working tree differs from `HEAD`.
    pub fn has_changes(&self) -> Result<bool, VcsError> {
        let output = self.git(&["status", "--porcelain"])?;
        Ok(!output.stdout.trim_ascii().is_empty())
    }

    /// Commit the index, optionally backdated to `date`.
    pub fn commit(&self, message: &str, date: Option<DateTime>) -> Result<(), VcsError> {
        let envs: Vec<(&str, String)> = date
            .map(|date| {
                let date = date.to_string();
                vec![("GIT_AUTHOR_DATE", date.clone()), ("GIT_COMMITTER_DATE", date)]
            })
            .unwrap_or_default();

        Cmd::new(&self.git)
            .args(["commit", "-m", message])
            .cwd(&self.root)
            .envs(envs)
            .filter(&GIT_FILTER)
            .run()
            .map_err(command_error)?;
        log!("git"; "commit \"{message}\"");
        Ok(())
    }

    pub fn current_branch(&self) -> Result<String, VcsError> {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Push `branch` to [`REMOTE`] and set it as upstream.
    pub fn push(&self, branch: &str) -> Result<(), VcsError> {
        log!("git"; "pushing {branch} to {REMOTE}");
        self.git(&["push", "-u", REMOTE, branch]).map(drop)
    }

    fn git(&self, args: &[&str]) -> Result<Output, VcsError> {
        Cmd::new(&self.git)
            .args(args)
            .cwd(&self.root)
            .filter(&GIT_FILTER)
            .run()
            .map_err(command_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pages_branch() {
        assert_eq!(pages_branch("git@github.com:me/me.github.io.git"), "master");
        assert_eq!(pages_branch("https://github.com/me/my-name.github.com"), "master");
        assert_eq!(pages_branch("https://github.com/me/blog.git"), "gh-pages");
        assert_eq!(pages_branch("git@gitlab.com:me/blog.git"), "gh-pages");
    }

    #[test]
    fn test_open_requires_git_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Repo::open(PathBuf::from("git"), dir.path()),
            Err(VcsError::NotARepository(_))
        ));

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let repo = Repo::open(PathBuf::from("git"), dir.path()).unwrap();
        assert_eq!(repo.root(), dir.path());
    }

    #[test]
    fn test_initial_branch_overrides_default() {
        let Ok(git) = Repo::locate("git") else {
            return;
        };
        let dir = TempDir::new().unwrap();
        let repo = Repo::new(git, dir.path());
        repo.init().unwrap();
        // As left by `init.defaultBranch = main`
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();

        repo.set_initial_branch("master").unwrap();
        let head = std::fs::read_to_string(dir.path().join(".git/HEAD")).unwrap();
        assert_eq!(head.trim(), "ref: refs/heads/master");

        repo.set_initial_branch("gh-pages").unwrap();
        let head = std::fs::read_to_string(dir.path().join(".git/HEAD")).unwrap();
        assert_eq!(head.trim(), "ref: refs/heads/gh-pages");
    }

    #[test]
    fn test_error_display() {
        let err = VcsError::NotARepository(PathBuf::from("static"));
        assert!(err.to_string().contains("phantom setup"));
    }
}
