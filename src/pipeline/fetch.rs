//! Streamed download of remote media into a staging file.

use crate::error::FetchError;
use futures_util::StreamExt;
use reqwest::header;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Browser-like User-Agent; some CDN hosts reject bare clients.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Referer accepted by the common media CDNs this bot sees.
const CDN_REFERER: &str = "https://discord.com/";

/// Download `url` into `dest`, streaming the body straight to disk.
///
/// On failure `dest` may be partially written; the caller owns its removal.
///
/// # Errors
///
/// Returns a [`FetchError`] on network failure, a non-success status or a
/// write failure. No retry is attempted.
pub async fn fetch(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), FetchError> {
    let response = client
        .get(url)
        .header(header::USER_AGENT, BROWSER_USER_AGENT)
        .header(header::REFERER, CDN_REFERER)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        // Telegram file URLs embed the bot token, keep them out of errors
        .map_err(|e| FetchError::Http(e.without_url()))?;

    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Http(e.without_url()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(bytes = written, dest = %dest.display(), "download complete");
    Ok(())
}
