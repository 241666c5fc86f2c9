//! Background archive extraction.
//!
//! Each archive is extracted on a blocking worker into `<stem>.unpacking/`,
//! renamed to `<stem>/` when complete, and only then deleted. A failed or
//! interrupted extraction therefore never looks like an unpacked set to the
//! fetcher's presence check.

use std::fs::File;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use ttabkit_shared::{Result, TtabError, archive_stem};

/// Summary of one successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackReport {
    pub archive: PathBuf,
    pub dest: PathBuf,
    pub files: usize,
    pub xml_files: usize,
}

/// Per-archive result; the path identifies the archive even on failure.
pub type UnpackResult = (PathBuf, Result<UnpackReport>);

/// Directory an archive unpacks into: its sibling named after the archive
/// stem, the same name the fetcher's presence check looks for.
pub fn unpack_dest(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unpacked".into());
    archive.with_file_name(archive_stem(&name))
}

/// Extract `archive` next to itself and remove it on success.
pub fn unpack_archive(archive: &Path) -> Result<UnpackReport> {
    let dest = unpack_dest(archive);
    let mut staging = dest.clone().into_os_string();
    staging.push(".unpacking");
    let staging = PathBuf::from(staging);

    let result = extract_into(archive, &staging).and_then(|(files, xml_files)| {
        if dest.exists() {
            std::fs::remove_dir_all(&dest).map_err(|e| TtabError::io(&dest, e))?;
        }
        std::fs::rename(&staging, &dest).map_err(|e| TtabError::io(&dest, e))?;
        Ok((files, xml_files))
    });

    match result {
        Ok((files, xml_files)) => {
            std::fs::remove_file(archive).map_err(|e| TtabError::io(archive, e))?;
            info!(archive = %archive.display(), files, xml_files, "archive unpacked");
            Ok(UnpackReport {
                archive: archive.to_path_buf(),
                dest,
                files,
                xml_files,
            })
        }
        Err(e) => {
            if staging.exists() {
                if let Err(rm) = std::fs::remove_dir_all(&staging) {
                    warn!(path = %staging.display(), error = %rm, "could not remove staging directory");
                }
            }
            Err(e)
        }
    }
}

fn extract_into(archive: &Path, staging: &Path) -> Result<(usize, usize)> {
    if staging.exists() {
        std::fs::remove_dir_all(staging).map_err(|e| TtabError::io(staging, e))?;
    }
    std::fs::create_dir_all(staging).map_err(|e| TtabError::io(staging, e))?;

    let file = File::open(archive).map_err(|e| TtabError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| TtabError::archive(format!("{}: {e}", archive.display())))?;

    let mut files = 0;
    let mut xml_files = 0;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| TtabError::archive(format!("{}: entry {i}: {e}", archive.display())))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(TtabError::archive(format!(
                "{}: entry {:?} escapes the destination",
                archive.display(),
                entry.name()
            )));
        };
        let out_path = staging.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| TtabError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TtabError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| TtabError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| TtabError::io(&out_path, e))?;

        files += 1;
        if out_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            xml_files += 1;
        }
        debug!(path = %out_path.display(), "extracted");
    }
    Ok((files, xml_files))
}

// ---------------------------------------------------------------------------
// UnpackSet
// ---------------------------------------------------------------------------

/// Group of in-flight extractions with a single wait-all barrier.
#[derive(Default)]
pub struct UnpackSet {
    tasks: JoinSet<UnpackResult>,
}

impl UnpackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start extracting `archive` on a blocking worker and return immediately.
    pub fn spawn(&mut self, archive: PathBuf) {
        self.tasks.spawn_blocking(move || {
            let outcome = std::panic::catch_unwind(|| unpack_archive(&archive)).unwrap_or_else(
                |_| Err(TtabError::archive(format!("{}: extraction panicked", archive.display()))),
            );
            (archive, outcome)
        });
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every outstanding extraction. One archive's failure never
    /// affects the others.
    pub async fn join_all(mut self) -> Vec<UnpackResult> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => {
                    if let Err(e) = &result.1 {
                        warn!(archive = %result.0.display(), error = %e, "unpack failed");
                    }
                    results.push(result);
                }
                Err(e) => warn!(error = %e, "unpack task was cancelled"),
            }
        }
        results
    }
}
