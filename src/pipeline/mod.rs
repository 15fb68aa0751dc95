//! Media acquisition and transcoding pipeline.
//!
//! One [`Pipeline::process`] call carries a request through its stages:
//! resolve (links only), acquire, transcode, deliver, clean. Stages are
//! strictly sequential within a request; requests are independent of each
//! other. Both staging files are released unconditionally when the request
//! terminates, success or failure — the janitor in [`temp`] backstops
//! anything that slips through.

/// Streamed download into staging files
pub mod fetch;
/// Link-to-media-URL resolution
pub mod resolve;
/// Temp pool, staging files and the janitor
pub mod temp;
/// External engine invocation
pub mod transcode;

use crate::config::MIN_MEDIA_BYTES;
use crate::error::{PipelineError, TranscodeError};
use async_trait::async_trait;
use self::temp::{StagingFile, StagingRole, TempPool};
use self::transcode::TranscodeSpec;
use std::path::Path;
use tracing::{debug, info, warn};

/// Source kind of an inbound media event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A photo sent to the chat.
    Photo,
    /// A video sent to the chat.
    Video,
    /// A message text holding a URL.
    Link,
}

impl RequestKind {
    /// User-facing notice for a failed request of this kind. Error internals
    /// never reach the user; they go to the log.
    #[must_use]
    pub const fn failure_notice(self) -> &'static str {
        match self {
            Self::Photo => "❌ Could not process image.",
            Self::Video => "❌ Could not process video.",
            Self::Link => "⚠️ Could not process link.",
        }
    }
}

/// One inbound media event, never persisted.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    /// Source kind driving resolution and spec mapping.
    pub kind: RequestKind,
    /// Download URL for photo/video file references, raw URL for links.
    pub source: String,
}

impl MediaRequest {
    /// Request for a photo file reference already turned into a download URL.
    #[must_use]
    pub fn photo(source_url: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Photo,
            source: source_url.into(),
        }
    }

    /// Request for a video file reference already turned into a download URL.
    #[must_use]
    pub fn video(source_url: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Video,
            source: source_url.into(),
        }
    }

    /// Request for a URL pasted into the chat.
    #[must_use]
    pub fn link(url: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Link,
            source: url.into(),
        }
    }
}

/// Delivery seam. The future must resolve only after the animation has been
/// read from disk, so the pipeline can release the file immediately after.
#[async_trait]
pub trait AnimationSink: Send + Sync {
    /// Deliver the finished animation to its destination.
    async fn deliver(&self, animation: &Path) -> anyhow::Result<()>;
}

/// Orchestrates fetch, resolve, transcode, delivery and cleanup.
pub struct Pipeline {
    http: reqwest::Client,
    pool: TempPool,
    ffmpeg_path: String,
}

impl Pipeline {
    /// Build a pipeline over an opened temp pool.
    #[must_use]
    pub fn new(pool: TempPool, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            pool,
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Temp pool backing this pipeline, shared with the janitor.
    #[must_use]
    pub fn pool(&self) -> &TempPool {
        &self.pool
    }

    /// Run one request to completion. Every staging file claimed along the
    /// way is released before this returns, on every path.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure as a [`PipelineError`]; no stage is
    /// retried and no partial output is delivered.
    pub async fn process(
        &self,
        request: &MediaRequest,
        sink: &dyn AnimationSink,
    ) -> Result<(), PipelineError> {
        let token = TempPool::token();
        info!(%token, kind = ?request.kind, "processing media request");

        let mut staged: Vec<StagingFile> = Vec::new();
        let result = self.run(request, &token, &mut staged, sink).await;
        for file in staged {
            file.release().await;
        }

        match &result {
            Ok(()) => info!(%token, "request complete"),
            Err(e) => warn!(%token, stage = e.stage(), error = %e, "request failed"),
        }
        result
    }

    async fn run(
        &self,
        request: &MediaRequest,
        token: &str,
        staged: &mut Vec<StagingFile>,
        sink: &dyn AnimationSink,
    ) -> Result<(), PipelineError> {
        let (target, raw_ext) = match request.kind {
            RequestKind::Photo => (request.source.clone(), ".jpg".to_string()),
            RequestKind::Video => (request.source.clone(), ".mp4".to_string()),
            RequestKind::Link => {
                let resolved = resolve::resolve(&self.http, &request.source).await?;
                debug!(token, %resolved, "resolved link target");
                let ext = resolve::path_extension(&resolved)
                    .map_or_else(|| ".gif".to_string(), |e| format!(".{e}"));
                (resolved, ext)
            }
        };

        let raw = self.pool.claim(token, StagingRole::RawInput, &raw_ext);
        let raw_path = raw.path().to_path_buf();
        staged.push(raw);
        fetch::fetch(&self.http, &target, &raw_path).await?;

        let size = tokio::fs::metadata(&raw_path)
            .await
            .map_err(TranscodeError::Io)?
            .len();
        if size < MIN_MEDIA_BYTES {
            return Err(TranscodeError::EmptyInput { size }.into());
        }

        let spec = match request.kind {
            RequestKind::Photo => TranscodeSpec {
                is_static_image: true,
            },
            RequestKind::Video => TranscodeSpec {
                is_static_image: false,
            },
            RequestKind::Link => TranscodeSpec::from_extension(&raw_ext),
        };

        let output = self.pool.claim(token, StagingRole::ProcessedOutput, ".mp4");
        let output_path = output.path().to_path_buf();
        staged.push(output);
        transcode::transcode(&self.ffmpeg_path, &raw_path, &output_path, spec).await?;

        debug!(token, "delivering animation");
        sink.deliver(&output_path)
            .await
            .map_err(PipelineError::Deliver)?;
        Ok(())
    }
}
