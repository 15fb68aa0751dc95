//! Bounded-lifetime temporary storage.
//!
//! All staging files for in-flight requests live in one flat [`TempPool`]
//! directory. Paths are claimed from a per-request token so concurrent
//! requests never collide, and every claimed file is released by its request.
//! The janitor sweeps the pool on an interval as a backstop for files orphaned
//! by a crashed or abandoned request.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Role of a staging file within its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingRole {
    /// Downloaded bytes as fetched from the source.
    RawInput,
    /// Transcoded animation ready for delivery.
    ProcessedOutput,
}

/// Flat directory holding all staging files.
#[derive(Debug, Clone)]
pub struct TempPool {
    dir: PathBuf,
}

impl TempPool {
    /// Open the pool, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Pool directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generate a fresh per-request token for staging filenames.
    #[must_use]
    pub fn token() -> String {
        Uuid::new_v4().as_simple().to_string()
    }

    /// Claim a staging path derived from `token`. No file is created yet;
    /// the path is unique as long as the token is.
    #[must_use]
    pub fn claim(&self, token: &str, role: StagingRole, ext: &str) -> StagingFile {
        let name = match role {
            StagingRole::RawInput => format!("{token}_raw{ext}"),
            StagingRole::ProcessedOutput => format!("{token}{ext}"),
        };
        StagingFile {
            path: self.dir.join(name),
            role,
            claimed_at: Instant::now(),
        }
    }

    /// Delete every file in the pool older than `max_age`, best-effort.
    /// Returns the number of files removed.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let mut removed = 0;
        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return 0;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let age = meta.modified().ok().and_then(|m| m.elapsed().ok());
            if age.is_some_and(|a| a >= max_age) && fs::remove_file(entry.path()).await.is_ok() {
                debug!(path = %entry.path().display(), "janitor removed stale file");
                removed += 1;
            }
        }
        removed
    }
}

/// A claimed path in the pool, owned by one request until released.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
    role: StagingRole,
    claimed_at: Instant,
}

impl StagingFile {
    /// Path of the staging file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Role of this file within its request.
    #[must_use]
    pub const fn role(&self) -> StagingRole {
        self.role
    }

    /// Remove the file from disk. Releasing a path that was never written,
    /// or was already removed, is not an error.
    pub async fn release(self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!(
                path = %self.path.display(),
                role = ?self.role,
                lived = ?self.claimed_at.elapsed(),
                "released staging file"
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove staging file, janitor will collect it"
            ),
        }
    }
}

/// Periodic sweep loop. Runs until `shutdown` is cancelled.
pub async fn run_janitor(
    pool: TempPool,
    interval: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // interval() fires immediately; the first sweep should wait a full period
    ticker.tick().await;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let removed = pool.sweep(max_age).await;
                if removed > 0 {
                    info!(removed, "janitor collected stale staging files");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        let a = TempPool::token();
        let b = TempPool::token();
        assert_ne!(a, b);
        assert!(!a.contains('-'));
    }

    #[tokio::test]
    async fn test_claim_paths_do_not_collide() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let pool = TempPool::new(dir.path()).await?;

        let token = TempPool::token();
        let raw = pool.claim(&token, StagingRole::RawInput, ".gif");
        let out = pool.claim(&token, StagingRole::ProcessedOutput, ".mp4");

        assert_ne!(raw.path(), out.path());
        assert!(raw.path().starts_with(dir.path()));
        assert!(raw
            .path()
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with("_raw.gif")));

        // A second request claims different paths for the same roles
        let other = pool.claim(&TempPool::token(), StagingRole::RawInput, ".gif");
        assert_ne!(raw.path(), other.path());
        Ok(())
    }

    #[tokio::test]
    async fn test_release_removes_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let pool = TempPool::new(dir.path()).await?;

        let staged = pool.claim(&TempPool::token(), StagingRole::RawInput, ".bin");
        fs::write(staged.path(), b"payload").await?;
        let path = staged.path().to_path_buf();

        staged.release().await;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_release_is_idempotent_for_missing_file() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let pool = TempPool::new(dir.path()).await?;

        // Never written to disk; release must not report anything observable
        let staged = pool.claim(&TempPool::token(), StagingRole::ProcessedOutput, ".mp4");
        staged.release().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_files() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let pool = TempPool::new(dir.path()).await?;

        let stale = dir.path().join("stale.bin");
        fs::write(&stale, b"old").await?;

        // Everything is older than a zero cutoff
        let removed = pool.sweep(Duration::ZERO).await;
        assert_eq!(removed, 1);
        assert!(!stale.exists());

        // A fresh file survives a generous cutoff
        let fresh = dir.path().join("fresh.bin");
        fs::write(&fresh, b"new").await?;
        let removed = pool.sweep(Duration::from_secs(3600)).await;
        assert_eq!(removed, 0);
        assert!(fresh.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_on_missing_directory_is_silent() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let pool = TempPool::new(dir.path().join("pool")).await?;
        fs::remove_dir_all(pool.dir()).await?;

        assert_eq!(pool.sweep(Duration::ZERO).await, 0);
        Ok(())
    }
}
