//! `phantom generate`: mirror the blog, then run the post-processing pipeline.

use anyhow::{Context, Result};
use std::fs;

use crate::{
    config::SiteConfig,
    debug, log,
    mirror::Mirror,
    pipeline::{Pipeline, PipelineSummary, platform::PipelineConfig, tree::MirrorTree},
};

pub fn generate_site(config: &SiteConfig) -> Result<PipelineSummary> {
    let platform = PipelineConfig::detect();
    let dir = config.output_dir();
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create mirror directory {}", dir.display()))?;

    let wget = Mirror::locate(&config.mirror.wget)?;
    let mirror = Mirror::new(
        wget,
        &config.site.source,
        dir,
        config.mirror.level,
        platform,
    );

    log!("mirror"; "{} -> {}", config.site.source, mirror.dir().display());
    mirror.mirror_site()?;
    let feeds = mirror.pull_feeds()?;
    log!("mirror"; "{feeds} feeds downloaded");

    let tree = MirrorTree::open(mirror.dir())?;
    debug!("generate"; "post-processing {}", tree.root().display());
    let summary = Pipeline::new(
        tree,
        platform,
        config.site.source.as_str(),
        config.site.public.clone(),
    )
    .run()?;

    log!(
        "generate";
        "done, {} pages in {}",
        summary.links.scanned,
        dir.display()
    );
    Ok(summary)
}
