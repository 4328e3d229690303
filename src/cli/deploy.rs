//! `phantom deploy`: commit the mirror and push it.

use anyhow::{Result, bail};

use crate::{config::SiteConfig, log, utils::date::DateTime, vcs::Repo};

pub fn deploy_site(config: &SiteConfig, date: Option<&str>) -> Result<()> {
    let date = date
        .map(|raw| {
            DateTime::parse(raw).ok_or_else(|| {
                anyhow::anyhow!("invalid --date `{raw}`, expected \"YYYY-MM-DD HH:MM:SS\"")
            })
        })
        .transpose()?;

    let git = Repo::locate(&config.deploy.git)?;
    let repo = Repo::open(git, config.output_dir())?;

    repo.add_all()?;
    if repo.has_changes()? {
        repo.commit(&commit_message(date), date)?;
    } else {
        log!("deploy"; "nothing changed since the last commit");
    }

    let branch = match &config.deploy.branch {
        Some(branch) => branch.clone(),
        None => repo.current_branch()?,
    };
    if branch == "HEAD" {
        bail!("{} has no branch checked out", repo.root().display());
    }
    repo.push(&branch)?;

    log!("deploy"; "pushed {branch}");
    Ok(())
}

fn commit_message(date: Option<DateTime>) -> String {
    let at = date.unwrap_or_else(DateTime::now_utc);
    format!("Blog update at {at}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message() {
        let date = DateTime::parse("2024-06-15 14:30:45");
        assert_eq!(commit_message(date), "Blog update at 2024-06-15 14:30:45");
        assert!(commit_message(None).starts_with("Blog update at "));
    }
}
