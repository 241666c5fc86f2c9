//! Deduplicating, rate-limited archive downloads.
//!
//! [`Fetcher::ensure_local`] returns `Ok` for "already present" and
//! "downloaded"; the failed case is the `Err` variant. The fetcher never
//! retries on its own: the orchestrator owns the retry policy.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use ttabkit_shared::{FileDescriptor, RateLimiter, Result, TtabError, UsptoConfig};

use crate::{API_KEY_HEADER, USER_AGENT};

/// Suffix of an in-flight download; never counted as present.
const PARTIAL_SUFFIX: &str = ".part";

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Which presence signal matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalState {
    /// A non-empty unpacked document set exists.
    Unpacked(PathBuf),
    /// The packed archive exists but has not been unpacked yet.
    Packed(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent(LocalState),
    Downloaded {
        path: PathBuf,
        bytes: u64,
        sha256: String,
    },
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Downloads descriptors into `data_dir`, one at a time, behind a shared limiter.
pub struct Fetcher {
    client: Client,
    data_dir: PathBuf,
    api_key: String,
    limiter: Arc<RateLimiter>,
    force: bool,
}

impl Fetcher {
    pub fn new(
        config: &UsptoConfig,
        data_dir: impl Into<PathBuf>,
        api_key: String,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtabError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            data_dir: data_dir.into(),
            api_key,
            limiter,
            force: false,
        })
    }

    /// Download even when a local copy exists.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Where the packed archive for `descriptor` lives.
    pub fn archive_path(&self, descriptor: &FileDescriptor) -> Result<PathBuf> {
        Ok(self.data_dir.join(checked_name(descriptor)?))
    }

    /// Where the unpacked documents for `descriptor` live.
    pub fn unpacked_dir(&self, descriptor: &FileDescriptor) -> Result<PathBuf> {
        checked_name(descriptor)?;
        Ok(self.data_dir.join(descriptor.stem()))
    }

    /// Check both presence signals without touching the network.
    pub fn local_state(&self, descriptor: &FileDescriptor) -> Result<Option<LocalState>> {
        let unpacked = self.unpacked_dir(descriptor)?;
        if dir_has_entries(&unpacked) {
            return Ok(Some(LocalState::Unpacked(unpacked)));
        }
        let archive = self.archive_path(descriptor)?;
        if archive.is_file() {
            return Ok(Some(LocalState::Packed(archive)));
        }
        Ok(None)
    }

    /// Make `descriptor` available locally, downloading only when neither
    /// presence signal matches (or `force` is set).
    #[instrument(skip_all, fields(file = %descriptor.name))]
    pub async fn ensure_local(&self, descriptor: &FileDescriptor) -> Result<FetchOutcome> {
        let target = self.archive_path(descriptor)?;
        if !self.force {
            if let Some(state) = self.local_state(descriptor)? {
                debug!(?state, "already present, skipping download");
                return Ok(FetchOutcome::AlreadyPresent(state));
            }
        }

        let url = descriptor.download_uri.as_deref().ok_or_else(|| {
            TtabError::validation(format!("{} has no download URI", descriptor.name))
        })?;

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| TtabError::io(&self.data_dir, e))?;

        self.limiter.acquire().await;
        info!(url, expected_bytes = descriptor.size, "downloading archive");

        let partial = self
            .data_dir
            .join(format!("{}{PARTIAL_SUFFIX}", descriptor.name));

        match self.download_to(url, &partial).await {
            Ok((bytes, sha256)) => {
                tokio::fs::rename(&partial, &target)
                    .await
                    .map_err(|e| TtabError::io(&target, e))?;
                info!(bytes, %sha256, "download complete");
                Ok(FetchOutcome::Downloaded {
                    path: target,
                    bytes,
                    sha256,
                })
            }
            Err(e) => {
                match tokio::fs::remove_file(&partial).await {
                    Err(rm) if rm.kind() != std::io::ErrorKind::NotFound => {
                        warn!(path = %partial.display(), error = %rm, "could not remove partial download");
                    }
                    _ => {}
                }
                Err(e)
            }
        }
    }

    /// Stream the body into `partial`, returning its length and SHA-256.
    async fn download_to(&self, url: &str, partial: &Path) -> Result<(u64, String)> {
        let mut response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| TtabError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtabError::from_status(status.as_u16(), url));
        }
        let expected = response.content_length();

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| TtabError::io(partial, e))?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TtabError::Network(format!("{url}: body read failed: {e}")))?
        {
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| TtabError::io(partial, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| TtabError::io(partial, e))?;

        if let Some(expected) = expected.filter(|&n| n != written) {
            return Err(TtabError::Network(format!(
                "{url}: truncated body ({written} of {expected} bytes)"
            )));
        }

        Ok((written, format!("{:x}", hasher.finalize())))
    }
}

/// The listing's file name, accepted only as a single plain path component
/// so it cannot resolve outside the data directory.
fn checked_name(descriptor: &FileDescriptor) -> Result<&str> {
    let name = descriptor.name.as_str();
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(name),
        _ => Err(TtabError::validation(format!(
            "unsafe archive file name {name:?} in listing"
        ))),
    }
}

fn dir_has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
