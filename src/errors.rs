//! Error types produced while configuring and assembling a simulation.
//!
//! Every error here is a setup error: once a [`Lattice`](crate::Lattice) is
//! stepping nothing can fail any more.

use std::path::PathBuf;

use petgraph::graph::NodeIndex;
use thiserror::Error;

/// Error returned when reading or querying configuration parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Returned when the configuration file cannot be opened.
    #[error("configuration file {path:?} could not be read: {source}")]
    Unreadable {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Returned when the configuration document is not a JSON object.
    #[error("configuration is not a valid parameter document: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Returned when the document parses but its root is not an object.
    #[error("configuration root must be an object of named parameters")]
    NotAnObject,
    /// Returned when a required parameter is absent.
    #[error("the parameter {0} is not set")]
    Missing(String),
    /// Returned when a parameter exists but has the wrong type.
    #[error("the parameter {name} has the wrong type: {source}")]
    WrongType {
        /// Name of the parameter.
        name: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// Returned when a parameter value is not physically meaningful.
    #[error("the parameter {name} = {value} is invalid: {reason}")]
    Invalid {
        /// Name of the parameter.
        name: &'static str,
        /// Rejected value.
        value: f64,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Error returned when scanning a lattice description file.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Returned when the lattice file cannot be opened.
    #[error("the lattice file {path:?} could not be read: {source}")]
    Unreadable {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Returned when the header lines are missing or malformed.
    #[error("malformed lattice header: {0}")]
    Header(String),
    /// Returned when a node line cannot be parsed.
    #[error("malformed node entry on line {line}: {content:?}")]
    NodeLine {
        /// One-based line number in the file.
        line: usize,
        /// The offending line.
        content: String,
    },
    /// Returned when the scanned grid does not match the configuration.
    #[error("the parameter file and the lattice file are not equivalent: {0}")]
    Dimensions(String),
    /// Returned when the declared node count differs from the nodes read.
    #[error("expected {expected} nodes but {found} were read")]
    NodeCount {
        /// Count declared on the first line.
        expected: usize,
        /// Nodes actually constructed.
        found: usize,
    },
}

/// Error returned when a simulation cannot be assembled.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Configuration could not be read or was incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The scanned lattice was unusable.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// Returned when a node handle does not belong to the lattice.
    #[error("node {0:?} does not exist in this lattice")]
    UnknownNode(NodeIndex),
    /// Returned when a boundary subset needed by a driver or pusher is empty.
    #[error("no {0} nodes are available")]
    EmptyBoundary(&'static str),
    /// Returned when a second driver beam is attached.
    #[error("a driver beam is already attached to this lattice")]
    DriverAlreadyAttached,
}

/// Error returned when trajectory output cannot be written.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Returned when the output file cannot be created or appended to.
    #[error("output file {path:?} could not be written: {source}")]
    Io {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
