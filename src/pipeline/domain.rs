//! Domain substitution.
//!
//! Rewrites every occurrence of the source address to the public address in
//! all text files of the tree, then runs the
//! [`CLEANUP_RULES`](super::rules::CLEANUP_RULES) over the result.

use rayon::prelude::*;
use std::{fs, path::Path};

use super::{
    PipelineError,
    rules::{CLEANUP_RULES, apply_text_rules},
    tree::{MirrorTree, write_if_changed},
};
use crate::{debug, logger::ProgressLine};

/// Address the mirror was taken from and the address it is published at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPair {
    pub source: String,
    pub public: String,
}

impl DomainPair {
    /// `None` without a public address: there is nothing to substitute.
    pub fn new(source: impl Into<String>, public: Option<impl Into<String>>) -> Option<Self> {
        let public = public?.into();
        Some(Self {
            source: source.into(),
            public,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubstituteReport {
    pub rewritten: usize,
    pub skipped_binary: usize,
}

/// Substitute the domain in every file outside `.git`.
pub fn substitute_domain(
    tree: &MirrorTree,
    pair: &DomainPair,
) -> Result<SubstituteReport, PipelineError> {
    let files = tree.files_excluding_vcs()?;
    let progress = ProgressLine::new("domain", files.len());

    let outcomes = files
        .par_iter()
        .map(|path| {
            let outcome = substitute_file(path, pair);
            progress.inc();
            outcome
        })
        .collect::<Result<Vec<_>, _>>();
    progress.finish();

    Ok(outcomes?
        .into_iter()
        .fold(SubstituteReport::default(), |mut report, outcome| {
            match outcome {
                FileOutcome::Binary => report.skipped_binary += 1,
                FileOutcome::Rewritten => report.rewritten += 1,
                FileOutcome::Unchanged => {}
            }
            report
        }))
}

enum FileOutcome {
    Binary,
    Rewritten,
    Unchanged,
}

fn substitute_file(path: &Path, pair: &DomainPair) -> Result<FileOutcome, PipelineError> {
    let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
    let Ok(text) = std::str::from_utf8(&bytes) else {
        return Ok(FileOutcome::Binary);
    };

    let text = substitute_text(text, pair);
    if write_if_changed(path, &bytes, text.as_bytes())? {
        debug!("domain"; "{}", path.display());
        Ok(FileOutcome::Rewritten)
    } else {
        Ok(FileOutcome::Unchanged)
    }
}

/// Replace the source address, then strip cache-busting leftovers.
pub fn substitute_text(text: &str, pair: &DomainPair) -> String {
    let replaced = if pair.source.is_empty() {
        text.to_string()
    } else {
        text.replace(&pair.source, &pair.public)
    };
    apply_text_rules(CLEANUP_RULES, &replaced).into_owned()
}
