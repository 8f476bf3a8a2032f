//! Route-level fatal errors — spec.md §7 "Route-level fatal errors (e.g.
//! unable to open broker) cause that route's Processor to exit; other
//! routes continue."
//!
//! Per-file errors (`StructuralError`, `FilterMiss`, `SinkError`,
//! `ArchiveError`) never escape a route; they are collapsed into an archive
//! outcome inside `processor::run` and never surface as a `RouteError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {route}: failed to construct sink: {source}")]
    SinkConstruction {
        route: String,
        #[source]
        source: cf_sinks::SinkError,
    },
}

pub type RouteResult<T> = std::result::Result<T, RouteError>;
