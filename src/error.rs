use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;

use crate::models::{BoundaryId, BoundaryLevel, SchoolId};

/// Bad or missing invocation parameters. Raised before any data is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("{0} and {1} cannot be combined")]
    Conflict(&'static str, &'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window start {start} is after window end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AncestryError {
    #[error("school {0} is not in the geography index")]
    UnknownSchool(SchoolId),
    #[error("boundary {0} is referenced but missing")]
    MissingBoundary(BoundaryId),
    #[error("boundary {0} appears twice in its own ancestry")]
    Cycle(BoundaryId),
    #[error("boundary {id} is a {found} where a {expected} was expected")]
    UnexpectedLevel {
        id: BoundaryId,
        expected: BoundaryLevel,
        found: BoundaryLevel,
    },
    #[error("district {0} has a parent boundary")]
    DistrictHasParent(BoundaryId),
    #[error("boundary {0} has no parent above it")]
    Truncated(BoundaryId),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode report rows: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no recipients configured for dispatch")]
    NoRecipients,
    #[error("failed to encode dispatch manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("failed to queue dispatch manifest in {path}: {source}")]
    Outbox {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("telemetry error: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}
