//! Site mirroring through `wget`.
//!
//! The mirror is the only step that touches the network. It downloads the
//! site recursively into the output directory, then pulls every feed the
//! recursion cannot discover on its own.

use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{log, pipeline::platform::PipelineConfig, utils::exec::Cmd};

/// Sitemap documents fetched next to the index.
const SITEMAPS: &[&str] = &[
    "sitemap.xsl",
    "sitemap.xml",
    "sitemap-pages.xml",
    "sitemap-posts.xml",
    "sitemap-authors.xml",
    "sitemap-tags.xml",
];

/// Directories whose entries each carry their own feed.
const FEED_SECTIONS: &[&str] = &["tag", "author"];

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("`{0}` not found, install it or set its path in the config")]
    MissingTool(String),

    #[error("cannot reach `{url}`, is the blog running? (wget exited with {status})")]
    Unreachable { url: String, status: String },

    #[error("{0}")]
    Command(String),

    #[error("IO error at `{}`", .0.display())]
    Io(PathBuf, #[source] io::Error),
}

/// A single feed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedJob {
    pub url: String,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Mirror {
    wget: PathBuf,
    source: String,
    dir: PathBuf,
    level: u32,
    config: PipelineConfig,
}

impl Mirror {
    pub fn new(
        wget: PathBuf,
        source: &str,
        dir: impl Into<PathBuf>,
        level: u32,
        config: PipelineConfig,
    ) -> Self {
        Self {
            wget,
            source: source.trim_end_matches('/').to_string(),
            dir: dir.into(),
            level,
            config,
        }
    }

    /// Find an executable on `PATH` (or accept an explicit path).
    pub fn locate(program: &str) -> Result<PathBuf, MirrorError> {
        which::which(program).map_err(|_| MirrorError::MissingTool(program.to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Arguments shared by every recursive download.
    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--level".to_string(),
            self.level.to_string(),
            "--recursive".to_string(),
        ];
        if self.config.convert_links {
            args.push("--convert-links".to_string());
        }
        args.extend([
            "--page-requisites".to_string(),
            "--no-parent".to_string(),
            "--directory-prefix".to_string(),
            self.dir.display().to_string(),
            "--no-host-directories".to_string(),
            format!(
                "--restrict-file-name={}",
                self.config.platform.restrict_file_name()
            ),
        ]);
        args
    }

    /// The index page followed by the sitemap documents.
    pub fn site_urls(&self) -> Vec<String> {
        std::iter::once(self.source.clone())
            .chain(SITEMAPS.iter().map(|name| format!("{}/{name}", self.source)))
            .collect()
    }

    /// Download the site recursively.
    ///
    /// The 404 page is fetched first and may fail; any other failure means
    /// the source is unreachable.
    pub fn mirror_site(&self) -> Result<(), MirrorError> {
        let not_found = format!("{}/404.html", self.source);
        log!("mirror"; "{not_found}");
        self.wget()
            .args(self.base_args())
            .arg("--content-on-error")
            .arg(&not_found)
            .status()
            .map_err(|e| MirrorError::Command(format!("{e:#}")))?;

        for url in self.site_urls() {
            log!("mirror"; "{url}");
            let status = self
                .wget()
                .args(self.base_args())
                .arg(&url)
                .status()
                .map_err(|e| MirrorError::Command(format!("{e:#}")))?;
            if !status.success() {
                return Err(MirrorError::Unreachable {
                    url,
                    status: status.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Download every feed, returning how many succeeded.
    ///
    /// A missing feed is logged and skipped.
    pub fn pull_feeds(&self) -> Result<usize, MirrorError> {
        let mut pulled = 0;
        for job in self.feed_jobs()? {
            if let Some(parent) = job.output.parent() {
                fs::create_dir_all(parent).map_err(|e| MirrorError::Io(parent.to_path_buf(), e))?;
            }
            let status = self
                .wget()
                .arg(format!("--output-document={}", job.output.display()))
                .arg(&job.url)
                .status()
                .map_err(|e| MirrorError::Command(format!("{e:#}")))?;
            if status.success() {
                pulled += 1;
            } else {
                log!("mirror"; "feed `{}` unavailable ({status})", job.url);
            }
        }
        Ok(pulled)
    }

    /// The site feed plus one feed per tag and author directory.
    pub fn feed_jobs(&self) -> Result<Vec<FeedJob>, MirrorError> {
        let feeds = self.dir.join("rss");
        let mut jobs = vec![FeedJob {
            url: format!("{}/rss/", self.source),
            output: feeds.join("feed.rss"),
        }];

        for section in FEED_SECTIONS {
            for entry in section_entries(&self.dir.join(section))? {
                jobs.push(FeedJob {
                    url: format!("{}/{section}/{entry}/rss", self.source),
                    output: feeds.join(section).join(&entry).join("rss").join("index.html"),
                });
            }
        }
        Ok(jobs)
    }

    fn wget(&self) -> Cmd {
        Cmd::new(&self.wget)
    }
}

/// Sorted names of the subdirectories of `dir`; empty when `dir` is absent.
fn section_entries(dir: &Path) -> Result<Vec<String>, MirrorError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MirrorError::Io(dir.to_path_buf(), e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MirrorError::Io(dir.to_path_buf(), e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::platform::Platform;
    use tempfile::TempDir;

    fn mirror(dir: &Path, platform: Platform) -> Mirror {
        Mirror::new(
            PathBuf::from("wget"),
            "http://localhost:2368/",
            dir,
            0,
            PipelineConfig::for_platform(platform),
        )
    }

    #[test]
    fn test_base_args_unix() {
        let m = mirror(Path::new("/srv/static"), Platform::Unix);
        assert_eq!(
            m.base_args().join(" "),
            "--level 0 --recursive --convert-links --page-requisites --no-parent \
             --directory-prefix /srv/static --no-host-directories --restrict-file-name=unix"
        );
    }

    #[test]
    fn test_base_args_windows() {
        let m = mirror(Path::new("static"), Platform::Windows);
        let args = m.base_args();
        assert!(!args.contains(&"--convert-links".to_string()));
        assert!(args.contains(&"--restrict-file-name=windows".to_string()));
    }

    #[test]
    fn test_site_urls() {
        let m = mirror(Path::new("static"), Platform::Unix);
        let urls = m.site_urls();
        assert_eq!(urls.len(), 7);
        assert_eq!(urls[0], "http://localhost:2368");
        assert_eq!(urls[1], "http://localhost:2368/sitemap.xsl");
        assert_eq!(urls[6], "http://localhost:2368/sitemap-tags.xml");
    }

    #[test]
    fn test_feed_jobs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("tag/rust")).unwrap();
        fs::create_dir_all(dir.path().join("tag/news")).unwrap();
        fs::write(dir.path().join("tag/stray.html"), "").unwrap();

        let m = mirror(dir.path(), Platform::Unix);
        let jobs = m.feed_jobs().unwrap();

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0], FeedJob {
            url: "http://localhost:2368/rss/".to_string(),
            output: dir.path().join("rss/feed.rss"),
        });
        assert_eq!(jobs[1].url, "http://localhost:2368/tag/news/rss");
        assert_eq!(jobs[1].output, dir.path().join("rss/tag/news/rss/index.html"));
        assert_eq!(jobs[2].url, "http://localhost:2368/tag/rust/rss");
    }

    #[test]
    fn test_locate_missing_tool() {
        assert!(matches!(
            Mirror::locate("phantom-no-such-tool"),
            Err(MirrorError::MissingTool(_))
        ));
    }
}
