//! `phantom add-domain`: point GitHub Pages at a custom domain.

use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

use crate::{config::SiteConfig, log};

/// File GitHub Pages reads the custom domain from.
const CNAME: &str = "CNAME";

pub fn add_domain(config: &SiteConfig, domain: &str) -> Result<()> {
    write_cname(config.output_dir(), domain)?;
    log!("domain"; "{domain} written to {CNAME}");
    Ok(())
}

fn write_cname(dir: &Path, domain: &str) -> Result<()> {
    let domain = domain.trim();
    if domain.is_empty() {
        bail!("domain is empty");
    }
    if !dir.is_dir() {
        bail!(
            "mirror directory {} does not exist, run `phantom setup` first",
            dir.display()
        );
    }

    let path = dir.join(CNAME);
    fs::write(&path, format!("{domain}\n"))
        .with_context(|| format!("Failed to write {}", path.display()))
}
