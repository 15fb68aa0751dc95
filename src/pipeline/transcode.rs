//! ffmpeg invocation producing the looping Telegram animation.
//!
//! One fixed parameter set: H.264, no audio, yuv420p for broad player
//! compatibility, faststart for progressive playback, CRF 20 at the
//! `ultrafast` preset (latency over compression), and a lanczos scale filter
//! that upsamples anything narrower than 640px. Static images are looped into
//! a 3-second clip; video is hard-truncated at 12 seconds.

use crate::config::{
    OUTPUT_CRF, STATIC_CLIP_SECS, TRANSCODE_TIMEOUT_SECS, UPSCALE_MIN_WIDTH, VIDEO_CLIP_SECS,
};
use crate::error::TranscodeError;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

/// Extensions treated as single still frames that need looping.
const STATIC_IMAGE_EXTS: &[&str] = &["jpg", "png", "jpeg", "webp"];

/// Per-request transcode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeSpec {
    /// Input is a single still frame and must be looped into a clip.
    pub is_static_image: bool,
}

impl TranscodeSpec {
    /// Classify by file extension (with or without leading dot),
    /// case-insensitively. Content is never inspected: a `.gif` is a video
    /// source even when the file holds a single frame.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.');
        Self {
            is_static_image: STATIC_IMAGE_EXTS.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        }
    }

    /// Hard cap on the output clip length.
    #[must_use]
    pub const fn clip_seconds(self) -> u32 {
        if self.is_static_image {
            STATIC_CLIP_SECS
        } else {
            VIDEO_CLIP_SECS
        }
    }

    /// Wall-clock limit for the engine invocation.
    #[must_use]
    pub const fn wall_clock_limit(self) -> Duration {
        Duration::from_secs(TRANSCODE_TIMEOUT_SECS)
    }
}

/// Build the full ffmpeg argument vector for one invocation.
#[must_use]
pub fn build_args(input: &Path, output: &Path, spec: TranscodeSpec) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error"]
        .map(String::from)
        .into();
    if spec.is_static_image {
        // A lone still has no duration: loop it as an image source,
        // the -t below truncates the loop
        args.extend(["-f", "image2", "-loop", "1"].map(String::from));
    }
    args.extend(["-i".to_string(), input.to_string_lossy().into_owned()]);
    args.extend(["-t".to_string(), spec.clip_seconds().to_string()]);
    args.extend(
        [
            "-c:v", "libx264", "-an", "-preset", "ultrafast", "-pix_fmt", "yuv420p", "-movflags",
            "+faststart", "-vf",
        ]
        .map(String::from),
    );
    args.push(format!(
        "scale='if(lt(iw,{w}),{w},iw)':-2:flags=lanczos",
        w = UPSCALE_MIN_WIDTH
    ));
    args.extend(["-crf".to_string(), OUTPUT_CRF.to_string()]);
    args.extend(["-f", "mp4"].map(String::from));
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Run the engine over `input`, producing `output`.
///
/// # Errors
///
/// Returns a [`TranscodeError`] if the engine cannot be spawned, exits with
/// an error (carrying its stderr), or exceeds the wall-clock limit. No retry
/// is attempted; one failed invocation fails the whole request.
pub async fn transcode(
    engine: &str,
    input: &Path,
    output: &Path,
    spec: TranscodeSpec,
) -> Result<(), TranscodeError> {
    let args = build_args(input, output, spec);
    debug!(engine, ?args, "spawning transcode");
    let started = Instant::now();

    let child = Command::new(engine)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        // Dropping the wait future on timeout must reap the child
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| TranscodeError::Spawn {
            engine: engine.to_string(),
            source,
        })?;

    let limit = spec.wall_clock_limit();
    let waited = tokio::time::timeout(limit, child.wait_with_output()).await;
    let finished = match waited {
        Ok(result) => result?,
        Err(_) => return Err(TranscodeError::Timeout(limit)),
    };

    if !finished.status.success() {
        return Err(TranscodeError::Engine {
            status: finished.status,
            stderr: String::from_utf8_lossy(&finished.stderr).trim().to_string(),
        });
    }

    info!(
        elapsed_ms = started.elapsed().as_millis(),
        output = %output.display(),
        "transcode complete"
    );
    Ok(())
}
