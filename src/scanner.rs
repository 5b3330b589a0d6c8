//! Reader for lattice description files.
//!
//! The format is XYZ-like:
//!
//! ```text
//! 4
//! 2 2 0.005
//! BL 0.0 0.0
//! B  0.005 0.0
//! TL 0.0025 0.00433
//! T  0.0075 0.00433
//! ```
//!
//! The first line holds the node count and the second `nx ny d`. Every further
//! non-empty line describes one node by a tag made of the letters `T`, `B`,
//! `L` and `N` followed by its x and y coordinates.

use std::fs;
use std::path::Path;

use crate::errors::ScanError;
use crate::geometry::{vector, Vector3};
use crate::node::Classification;

/// One node read from a lattice file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScannedNode {
    /// Boundary membership from the tag letters.
    pub classification: Classification,
    /// Position.
    pub r: Vector3,
}

/// The contents of a lattice file.
#[derive(Clone, Debug, PartialEq)]
pub struct ScannedLattice {
    /// Columns declared in the header.
    pub nx: usize,
    /// Rows declared in the header.
    pub ny: usize,
    /// Spacing declared in the header.
    pub spacing: f64,
    /// Nodes in file order.
    pub nodes: Vec<ScannedNode>,
}

impl ScannedLattice {
    /// Read and parse a lattice file.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Unreadable`] when the file cannot be opened and any
    /// error of [`ScannedLattice::parse`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ScanError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let scanned = Self::parse(&text)?;
        log::info!(
            "Scanned {} nodes ({} x {}) from {}",
            scanned.nodes.len(),
            scanned.nx,
            scanned.ny,
            path.display()
        );
        Ok(scanned)
    }

    /// Parse the text of a lattice file.
    ///
    /// Node lines with more than three columns are accepted with a warning;
    /// the extra columns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Header`] for a missing or malformed header,
    /// [`ScanError::NodeLine`] for an unparseable node and
    /// [`ScanError::NodeCount`] when the number of nodes read differs from the
    /// declared count.
    pub fn parse(text: &str) -> Result<Self, ScanError> {
        let mut lines = text.lines();
        let count_line = lines
            .next()
            .ok_or_else(|| ScanError::Header("missing node count".to_owned()))?;
        let expected: usize = count_line
            .trim()
            .parse()
            .map_err(|_| ScanError::Header(format!("invalid node count {count_line:?}")))?;

        let header = lines
            .next()
            .ok_or_else(|| ScanError::Header("expected nx, ny, d on the second line".to_owned()))?;
        let tokens: Vec<&str> = header.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(ScanError::Header(format!(
                "expected nx, ny, d on the second line, found {header:?}"
            )));
        }
        let header_error = || ScanError::Header(format!("could not parse nx, ny, d from {header:?}"));
        let nx = tokens[0].parse().map_err(|_| header_error())?;
        let ny = tokens[1].parse().map_err(|_| header_error())?;
        let spacing = tokens[2].parse().map_err(|_| header_error())?;

        let mut nodes = Vec::with_capacity(expected);
        for (offset, line) in lines.enumerate() {
            let number = offset + 3;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.len() {
                0 => continue,
                3 => {}
                n if n > 3 => log::warn!("line {number} contains {n} columns, expected 3"),
                _ => {
                    return Err(ScanError::NodeLine {
                        line: number,
                        content: line.to_owned(),
                    })
                }
            }
            let node_error = || ScanError::NodeLine {
                line: number,
                content: line.to_owned(),
            };
            let x: f64 = tokens[1].parse().map_err(|_| node_error())?;
            let y: f64 = tokens[2].parse().map_err(|_| node_error())?;
            nodes.push(ScannedNode {
                classification: classify(tokens[0]),
                r: vector(x, y),
            });
        }

        if nodes.len() != expected {
            return Err(ScanError::NodeCount {
                expected,
                found: nodes.len(),
            });
        }
        Ok(Self {
            nx,
            ny,
            spacing,
            nodes,
        })
    }

    /// Confirm that the file describes the grid the configuration asks for.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Dimensions`] naming every mismatching dimension.
    pub fn validate(&self, nx: usize, ny: usize) -> Result<(), ScanError> {
        let mut reasons = Vec::new();
        if nx != self.nx {
            reasons.push(format!("parameter nx = {nx} != {} = scanned nx", self.nx));
        }
        if ny != self.ny {
            reasons.push(format!("parameter ny = {ny} != {} = scanned ny", self.ny));
        }
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ScanError::Dimensions(reasons.join("; ")))
        }
    }
}

fn classify(tag: &str) -> Classification {
    Classification {
        top: tag.contains('T'),
        bottom: tag.contains('B'),
        left: tag.contains('L'),
    }
}
