//! Build description fingerprints
//!
//! The fingerprint is a SHA-256 over the rendered description body, so any
//! difference in the text ninja would read (input order, depfile settings,
//! per-edge overrides) makes an existing description stale. It is stored in
//! the description's header comment and read back on the next run.

use crate::error::{BuildError, BuildResult};
use crate::graph::BuildGraph;
use crate::ninja;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Marker that introduces the fingerprint in a description header
pub const FINGERPRINT_MARKER: &str = "# kiln fingerprint: ";

/// Hex-encoded SHA-256 of a graph's staleness-relevant content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a graph
    pub fn of_graph(graph: &BuildGraph) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(ninja::render_body(graph).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Header line carrying this fingerprint
    pub fn header_line(&self) -> String {
        format!("{}{}", FINGERPRINT_MARKER, self.0)
    }

    /// Extract the fingerprint from description text
    pub fn from_description(text: &str) -> Option<Self> {
        text.lines()
            .take_while(|line| line.starts_with('#') || line.trim().is_empty())
            .find_map(parse_header_line)
    }

    /// Read the fingerprint stored in an existing description
    ///
    /// Only the leading comment block is read.
    pub fn read_from(path: &Path) -> BuildResult<Option<Self>> {
        let file = fs::File::open(path).map_err(|e| BuildError::io(path, e))?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| BuildError::io(path, e))?;
            if !(line.starts_with('#') || line.trim().is_empty()) {
                break;
            }
            if let Some(fingerprint) = parse_header_line(&line) {
                return Ok(Some(fingerprint));
            }
        }
        Ok(None)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_header_line(line: &str) -> Option<Fingerprint> {
    line.strip_prefix(FINGERPRINT_MARKER)
        .map(str::trim)
        .filter(|hex| !hex.is_empty())
        .map(|hex| Fingerprint(hex.to_string()))
}
