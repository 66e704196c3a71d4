//! Publisher - content-addressed output directory
//!
//! Entries whose output already exists are left alone; a fingerprint
//! change produces a new file name, so an existing output is current.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::log::Logger;
use crate::manifest::Manifest;
use crate::pipeline::PipelineError;
use crate::process::{compress, output_path, Outcome, ProcessContext, ProcessorSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub written: Vec<String>,
    pub unchanged: Vec<String>,
    /// Source paths dropped from the manifest because nothing was published.
    pub removed: Vec<String>,
    pub compressed: usize,
}

pub struct Publisher<'a> {
    config: &'a BuildConfig,
    logger: &'a Logger,
    processors: ProcessorSet,
}

impl<'a> Publisher<'a> {
    pub fn new(config: &'a BuildConfig, logger: &'a Logger) -> Self {
        Self::with_processors(config, logger, ProcessorSet::detect())
    }

    pub fn with_processors(config: &'a BuildConfig, logger: &'a Logger, processors: ProcessorSet) -> Self {
        Self { config, logger, processors }
    }

    pub fn publish(&self, manifest: &mut Manifest) -> Result<PublishReport, PipelineError> {
        let public_dir = self.config.public_dir();
        fs::create_dir_all(&public_dir).map_err(|source| PipelineError::Io {
            path: public_dir.clone(),
            source,
        })?;

        let mut report = PublishReport::default();
        let mut produced: Vec<PathBuf> = vec![];
        let mut dropped = vec![];
        {
            let snapshot: &Manifest = manifest;
            let ctx = ProcessContext { manifest: snapshot, config: self.config, logger: self.logger };
            for entry in snapshot {
                let output = output_path(&public_dir, entry);
                if output.exists() {
                    report.unchanged.push(entry.source_path.clone());
                    continue;
                }
                match self.processors.process(entry, &output, &ctx)? {
                    Outcome::Written => {
                        report.written.push(entry.source_path.clone());
                        produced.push(output);
                    }
                    Outcome::Skipped => dropped.push(entry.source_path.clone()),
                }
            }
        }

        manifest.retain(|e| !dropped.contains(&e.source_path));
        report.removed = dropped;

        report.compressed = compress(&produced, self.config.compression)?;
        self.logger.log(
            "publish",
            format!(
                "{} written, {} unchanged, {} removed",
                report.written.len(),
                report.unchanged.len(),
                report.removed.len()
            ),
        );
        Ok(report)
    }
}
