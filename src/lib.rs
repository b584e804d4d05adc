#![recursion_limit = "256"]

//! Rate-limited Riot Games API ingester.
//!
//! Summoner and match payloads are fetched through a dual-window rate gate
//! and written to an object store unless they are already there.

pub mod cancel;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod rate_limiter;
pub mod types;

// Application layer (use cases and ports) and infrastructure adapters
pub mod app;
pub mod infra;

pub use app::ingest_use_case::{EntityKind, IngestOutcome, IngestReport, IngestUseCase};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use error::{IngestError, Result};
