//! `phantom setup`: turn the mirror directory into a GitHub Pages checkout.

use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

use crate::{
    cli::common::{confirm, prompt},
    config::SiteConfig,
    log,
    vcs::{REMOTE, Repo, pages_branch},
};

const README: &str = "# Blog\n\nPowered by [Ghost](https://ghost.org) and phantom.\n";

pub fn setup_repo(config: &SiteConfig) -> Result<()> {
    let url = match &config.deploy.url {
        Some(url) => url.clone(),
        None => prompt("GitHub Pages repository URL:")?,
    };
    if url.is_empty() {
        bail!("no repository URL given");
    }

    let dir = config.output_dir();
    if dir.exists() {
        let question = format!("{} already exists, remove it?", dir.display());
        if !confirm(&question)? {
            bail!("Aborted, {} left untouched", dir.display());
        }
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let git = Repo::locate(&config.deploy.git)?;
    let repo = Repo::new(git, dir);
    repo.init()?;

    let branch = config
        .deploy
        .branch
        .as_deref()
        .unwrap_or_else(|| pages_branch(&url));
    repo.set_initial_branch(branch)?;
    repo.add_remote(REMOTE, &url)?;
    write_readme(repo.root())?;

    log!("setup"; "{} ready, publishing to {url} ({branch})", dir.display());
    Ok(())
}

fn write_readme(dir: &Path) -> Result<()> {
    let path = dir.join("README.md");
    fs::write(&path, README).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_readme() {
        let dir = TempDir::new().unwrap();
        write_readme(dir.path()).unwrap();
        let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
        assert!(readme.starts_with("# Blog\n"));
        assert!(readme.contains("Ghost"));
    }
}
