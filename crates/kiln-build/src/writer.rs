//! Idempotent description writer

use crate::error::{BuildError, BuildResult};
use crate::fingerprint::Fingerprint;
use crate::graph::BuildGraph;
use crate::ninja;
use kiln_config::StalenessSetting;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// How an existing description is judged out of date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Staleness {
    /// Rewrite when the stored fingerprint differs from the graph's
    #[default]
    Fingerprint,
    /// Rewrite only when the description is missing
    ExistenceOnly,
}

impl From<StalenessSetting> for Staleness {
    fn from(setting: StalenessSetting) -> Self {
        match setting {
            StalenessSetting::Fingerprint => Self::Fingerprint,
            StalenessSetting::Existence => Self::ExistenceOnly,
        }
    }
}

/// Why a description was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteReason {
    Missing,
    Forced,
    Stale,
}

impl fmt::Display for WriteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Missing => "missing",
            Self::Forced => "forced",
            Self::Stale => "stale",
        };
        f.write_str(name)
    }
}

/// Outcome of [`GraphWriter::write`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteResult {
    /// The existing description was kept untouched
    Skipped,
    Written(WriteReason),
}

impl WriteResult {
    pub fn was_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Serializes graphs to Ninja descriptions
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphWriter {
    staleness: Staleness,
}

impl GraphWriter {
    pub fn new(staleness: Staleness) -> Self {
        Self { staleness }
    }

    pub fn staleness(&self) -> Staleness {
        self.staleness
    }

    /// Write `graph` to `destination` unless an up-to-date description exists
    ///
    /// A skipped write touches nothing on disk.
    pub fn write(
        &self,
        graph: &BuildGraph,
        destination: &Path,
        force: bool,
    ) -> BuildResult<WriteResult> {
        graph.validate()?;
        let fingerprint = Fingerprint::of_graph(graph);

        let reason = if force {
            WriteReason::Forced
        } else if !destination.exists() {
            WriteReason::Missing
        } else {
            match self.staleness {
                Staleness::ExistenceOnly => {
                    debug!(path = %destination.display(), "description exists, skipping");
                    return Ok(WriteResult::Skipped);
                }
                Staleness::Fingerprint => {
                    let stored = Fingerprint::read_from(destination)?;
                    if stored.as_ref() == Some(&fingerprint) {
                        debug!(path = %destination.display(), "description up to date");
                        return Ok(WriteResult::Skipped);
                    }
                    WriteReason::Stale
                }
            }
        };

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
        }

        let text = ninja::render(graph, &fingerprint);
        fs::write(destination, text).map_err(|e| BuildError::io(destination, e))?;

        info!(
            path = %destination.display(),
            reason = %reason,
            nodes = graph.len(),
            "wrote build description"
        );
        Ok(WriteResult::Written(reason))
    }
}
