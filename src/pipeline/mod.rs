//! Post-processing pipeline for a freshly mirrored site.
//!
//! # Passes
//!
//! ```text
//! Mirrored ─▶ Normalized ─▶ FeedsConverted ─▶ LinksFixed ─▶ DomainSubstituted
//!              normalize      feed              links         domain
//! ```
//!
//! Passes run strictly in order on the same [`MirrorTree`], mutating it in
//! place. A failed pass leaves the pipeline in [`PipelineState::Failed`];
//! there is no rollback.

pub mod domain;
pub mod feed;
pub mod links;
pub mod normalize;
pub mod platform;
pub mod rules;
pub mod tree;

use std::{
    fmt, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{debug, log};
use domain::{DomainPair, SubstituteReport};
use links::LinkReport;
use normalize::NormalizeReport;
use platform::PipelineConfig;
use tree::MirrorTree;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk `{}`: {message}", path.display())]
    Walk { path: PathBuf, message: String },

    #[error("`{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("path `{}` escapes the mirror root", .0.display())]
    Escape(PathBuf),

    #[error("pipeline failed while {stage}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Milestones of the pipeline. Each stage names the pass that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Mirrored,
    Normalized,
    FeedsConverted,
    LinksFixed,
    DomainSubstituted,
}

impl Stage {
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Mirrored => Some(Self::Normalized),
            Self::Normalized => Some(Self::FeedsConverted),
            Self::FeedsConverted => Some(Self::LinksFixed),
            Self::LinksFixed => Some(Self::DomainSubstituted),
            Self::DomainSubstituted => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mirrored => "mirroring",
            Self::Normalized => "normalizing file names",
            Self::FeedsConverted => "converting feeds",
            Self::LinksFixed => "fixing links",
            Self::DomainSubstituted => "substituting the domain",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    At(Stage),
    /// Terminal: `during` is the stage that was being produced.
    Failed { during: Stage },
}

/// What every pass did, for the final report.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub normalize: NormalizeReport,
    pub feeds: usize,
    pub links: LinkReport,
    /// `None` when no public address was configured.
    pub domain: Option<SubstituteReport>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Pipeline {
    tree: MirrorTree,
    config: PipelineConfig,
    source: String,
    domain: Option<DomainPair>,
    state: PipelineState,
    summary: PipelineSummary,
}

impl Pipeline {
    /// Start a pipeline on a tree the mirror step just produced.
    pub fn new(
        tree: MirrorTree,
        config: PipelineConfig,
        source: impl Into<String>,
        public: Option<String>,
    ) -> Self {
        let source = source.into();
        Self {
            domain: DomainPair::new(source.clone(), public),
            source,
            tree,
            config,
            state: PipelineState::At(Stage::Mirrored),
            summary: PipelineSummary::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the next pass. Returns the stage reached, or `None` once terminal.
    pub fn step(&mut self) -> Result<Option<Stage>, PipelineError> {
        let PipelineState::At(current) = self.state else {
            return Ok(None);
        };
        let Some(next) = current.next() else {
            return Ok(None);
        };

        match self.run_pass(next) {
            Ok(()) => {
                self.state = PipelineState::At(next);
                Ok(Some(next))
            }
            Err(e) => {
                self.state = PipelineState::Failed { during: next };
                Err(PipelineError::Stage {
                    stage: next,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Run every remaining pass.
    pub fn run(mut self) -> Result<PipelineSummary, PipelineError> {
        while self.step()?.is_some() {}
        debug!("pipeline"; "finished at {:?}", self.state());
        Ok(self.summary)
    }

    fn run_pass(&mut self, stage: Stage) -> Result<(), PipelineError> {
        let tree = &self.tree;
        match stage {
            Stage::Mirrored => {}
            Stage::Normalized => {
                let report = normalize::normalize(tree, &self.config, &self.source)?;
                log!(
                    "normalize";
                    "{} duplicates collapsed, {} pages extended",
                    report.deduplicated,
                    report.extended
                );
                self.summary.normalize = report;
            }
            Stage::FeedsConverted => {
                let count = feed::convert_feeds(tree)?;
                log!("feed"; "{count} feeds converted");
                self.summary.feeds = count;
            }
            Stage::LinksFixed => {
                let report = links::fix_links(tree)?;
                log!(
                    "links";
                    "{} links fixed in {} pages",
                    report.links,
                    report.pages
                );
                self.summary.links = report;
            }
            Stage::DomainSubstituted => {
                let Some(pair) = &self.domain else {
                    log!("domain"; "no public address, keeping {}", self.source);
                    return Ok(());
                };
                log!("domain"; "replace {} with {}", pair.source, pair.public);
                let report = domain::substitute_domain(tree, pair)?;
                log!(
                    "domain";
                    "{} files rewritten, {} binary files skipped",
                    report.rewritten,
                    report.skipped_binary
                );
                self.summary.domain = Some(report);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::Platform;
    use std::fs;
    use tempfile::TempDir;

    const SOURCE: &str = "http://localhost:2368";
    const UNIX: PipelineConfig = PipelineConfig::for_platform(Platform::Unix);

    fn mirror(files: &[(&str, &str)]) -> (TempDir, MirrorTree) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let tree = MirrorTree::open(dir.path()).unwrap();
        (dir, tree)
    }

    fn read(dir: &TempDir, name: &str) -> String {
        fs::read_to_string(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Mirrored;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(stage, Stage::DomainSubstituted);
    }

    #[test]
    fn test_full_run() {
        let (dir, tree) = mirror(&[
            (
                "index.html",
                r#"<a href="/about">About</a><link rel="alternate" href="http://localhost:2368/rss/">"#,
            ),
            ("about", r#"<a href="/index.html">home</a>"#),
            (
                "assets/css/screen.css#v=abc",
                "body{background:url(http://localhost:2368/a.png)}",
            ),
            (
                "rss/index.html",
                "<rss><channel><link>http://localhost:2368/</link></channel></rss>",
            ),
            ("tag/news", r#"<a href="/tag/news/rss/">feed</a>"#),
        ]);

        let pipeline = Pipeline::new(tree, UNIX, SOURCE, Some("https://blog.example.com".into()));
        let summary = pipeline.run().unwrap();

        assert_eq!(summary.normalize.deduplicated, 1);
        assert_eq!(summary.normalize.extended, 2);
        assert_eq!(summary.feeds, 1);
        assert_eq!(summary.domain.unwrap().rewritten, 4);

        assert_eq!(
            read(&dir, "index.html"),
            "<!DOCTYPE html>\n<a href=\"/about.html\">About</a>\
             <link rel=\"alternate\" href=\"https://blog.example.com/rss/index.rss\">"
        );
        assert_eq!(read(&dir, "about.html"), "<!DOCTYPE html>\n<a href=\"/\">home</a>");
        assert_eq!(
            read(&dir, "tag/news.html"),
            "<!DOCTYPE html>\n<a href=\"/tag/news/rss/index.rss\">feed</a>"
        );
        assert_eq!(
            read(&dir, "assets/css/screen.css"),
            "body{background:url(https://blog.example.com/a.png)}"
        );

        let feed = read(&dir, "rss/index.rss");
        assert!(feed.starts_with("<?xml"));
        assert!(feed.contains("<link>https://blog.example.com/</link>"));
    }

    #[test]
    fn test_steps_without_public_address() {
        let (dir, tree) = mirror(&[("index.html", "<a href=\"http://localhost:2368/\">x</a>")]);
        let mut pipeline = Pipeline::new(tree, UNIX, SOURCE, None);

        let mut reached = Vec::new();
        while let Some(stage) = pipeline.step().unwrap() {
            reached.push(stage);
        }
        assert_eq!(
            reached,
            vec![
                Stage::Normalized,
                Stage::FeedsConverted,
                Stage::LinksFixed,
                Stage::DomainSubstituted,
            ]
        );
        assert_eq!(pipeline.state(), PipelineState::At(Stage::DomainSubstituted));
        assert!(pipeline.step().unwrap().is_none());
        assert!(read(&dir, "index.html").contains(SOURCE));
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_records_stage() {
        // The canonical name is taken by a directory, so the rename fails
        let (_dir, tree) = mirror(&[("about#v=1", "page"), ("about/index.html", "x")]);
        let mut pipeline = Pipeline::new(tree, UNIX, SOURCE, None);

        let err = pipeline.step().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage {
                stage: Stage::Normalized,
                ..
            }
        ));
        assert!(err.to_string().contains("normalizing file names"));
        assert_eq!(pipeline.state(), PipelineState::Failed {
            during: Stage::Normalized
        });
        assert!(pipeline.step().unwrap().is_none());
    }
}
