//! Error taxonomy for the media pipeline.
//!
//! Each pipeline stage has its own error type; `PipelineError` is the
//! request-level sum the orchestrator reports. User-facing notices are derived
//! from the request kind, never from error internals.

use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Errors from downloading remote bytes to a staging file.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure, non-success HTTP status or stream interruption.
    #[error("download failed: {0}")]
    Http(reqwest::Error),
    /// Failure writing the response body to disk.
    #[error("staging write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from resolving a link to a direct media URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Neither the fast path nor page metadata produced a candidate.
    #[error("no media found")]
    NoMediaFound,
    /// The page itself could not be fetched for scraping.
    #[error("page fetch failed: {0}")]
    PageFetch(#[source] reqwest::Error),
}

/// Errors from the external transcoding engine.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Downloaded input is below the minimum plausible media size.
    #[error("empty file ({size} bytes)")]
    EmptyInput {
        /// Actual size of the rejected input.
        size: u64,
    },
    /// The engine binary could not be started.
    #[error("failed to start {engine}: {source}")]
    Spawn {
        /// Engine binary that failed to spawn.
        engine: String,
        /// Underlying spawn error.
        source: std::io::Error,
    },
    /// The engine exited with an error; carries its diagnostic output.
    #[error("engine exited with {status}: {stderr}")]
    Engine {
        /// Exit status reported by the engine.
        status: ExitStatus,
        /// Trimmed stderr from the engine.
        stderr: String,
    },
    /// The engine exceeded the wall-clock limit and was killed.
    #[error("engine timed out after {0:?}")]
    Timeout(Duration),
    /// Filesystem failure around the invocation.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Request-level error reported by the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    /// The delivery collaborator rejected the finished animation.
    #[error("delivery failed: {0}")]
    Deliver(anyhow::Error),
}

impl PipelineError {
    /// Stage at which the request failed, for structured logs.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "acquiring",
            Self::Resolve(_) => "resolving",
            Self::Transcode(_) => "transcoding",
            Self::Deliver(_) => "delivering",
        }
    }
}
