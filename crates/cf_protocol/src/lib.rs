//! Route configuration, provenance envelope, and shared error taxonomy for
//! csv2json's per-route ingestion pipelines. See `SPEC_FULL.md` §2/§4.

pub mod config;
pub mod envelope;
pub mod error;

pub use config::{
    legacy_route_from_env, load_routes_file, redact_broker_uri, ArchiveConfig, InputConfig,
    OutputConfig, OutputType, ParsingConfig, QueueType, RouteConfig, RoutesFile, WatchMode,
};
pub use envelope::{
    build_envelope, build_legacy_envelope, EnvelopeContext, EnvelopeIngestion, EnvelopeMeta,
    EnvelopeSource, LegacyEnvelope, MessageEnvelope, SERVICE_NAME,
};
pub use error::{ConfigError, ConfigResult};
