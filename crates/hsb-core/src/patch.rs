//! Stage per-build extraction directories.
//!
//! `NGDP_DATA_DIR/<build>` is the persistent copy of a build's raw data and
//! `build/extracted/<build>` is only ever a symlink to it. Existing entries
//! are never replaced, merged or deleted.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{HsbConfig, validate_build_id};
use crate::error::HsbError;
use crate::exec::{CommandRunner, CommandSpec};

/// Where a build currently stands, checked in the same order the preparer acts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PatchState {
    /// The extraction entry already exists; nothing to do.
    LinkPresent { link: PathBuf },
    /// Persistent data exists; only the link is missing.
    DataPresent { target: PathBuf },
    /// Downloader output is waiting to be relocated.
    DownloadReady { source: PathBuf, target: PathBuf },
    /// Nothing to work from; the downloader has to run first.
    DownloadMissing { ngdp_out: PathBuf, ngdp_dir: PathBuf },
}

/// Result of a successful [`prepare_patch_directories`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PrepareOutcome {
    AlreadyPresent {
        link: PathBuf,
    },
    Linked {
        link: PathBuf,
        target: PathBuf,
        /// Whether the downloader output was moved into place by this call.
        relocated: bool,
    },
}

/// Classify `build` without touching the filesystem.
///
/// `NGDP_OUT` is only looked at when neither the link nor the persistent
/// data exist.
pub fn inspect_patch_directories(config: &HsbConfig, build: &str) -> Result<PatchState, HsbError> {
    validate_build_id(build)?;

    let link = config.extracted_dir(build);
    if entry_exists(&link) {
        return Ok(PatchState::LinkPresent { link });
    }

    let target = config.persistent_dir(build);
    if target.exists() {
        return Ok(PatchState::DataPresent { target });
    }

    let source = config.ngdp_out();
    if source.exists() {
        Ok(PatchState::DownloadReady { source, target })
    } else {
        Ok(PatchState::DownloadMissing {
            ngdp_out: source,
            ngdp_dir: config.ngdp_dir(),
        })
    }
}

/// Make `build/extracted/<build>` point at the persistent data for `build`,
/// moving the downloader output into place first if that is the only copy.
///
/// Returns [`HsbError::MissingDownloaderOutput`] without touching anything
/// when there is no data to link.
pub fn prepare_patch_directories(
    config: &HsbConfig,
    runner: &impl CommandRunner,
    build: &str,
) -> Result<PrepareOutcome, HsbError> {
    let link = config.extracted_dir(build);

    let (target, relocated) = match inspect_patch_directories(config, build)? {
        PatchState::LinkPresent { link } => {
            tracing::info!("{} already exists, not overwriting.", link.display());
            return Ok(PrepareOutcome::AlreadyPresent { link });
        }
        PatchState::DataPresent { target } => {
            tracing::info!(
                "{} already exists, skipping download checks.",
                target.display()
            );
            (target, false)
        }
        PatchState::DownloadMissing { ngdp_out, ngdp_dir } => {
            return Err(HsbError::MissingDownloaderOutput { ngdp_out, ngdp_dir });
        }
        PatchState::DownloadReady { source, target } => {
            relocate(runner, &source, &target)?;
            (target, true)
        }
    };

    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|e| HsbError::io("create directory", parent, e))?;
    }
    symlink_dir(&target, &link).map_err(|e| HsbError::io("create symlink", &link, e))?;
    tracing::info!("'{}' -> '{}'", link.display(), target.display());

    Ok(PrepareOutcome::Linked {
        link,
        target,
        relocated,
    })
}

/// Move the downloader output to its persistent location.
///
/// A plain rename is tried first; across filesystems the move is handed to
/// `mv`, which copies and removes the source.
fn relocate(runner: &impl CommandRunner, source: &Path, target: &Path) -> Result<(), HsbError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| HsbError::io("create directory", parent, e))?;
    }

    tracing::info!("moving {} to {}", source.display(), target.display());
    relocate_with(|from, to| fs::rename(from, to), runner, source, target)
}

fn relocate_with(
    rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
    runner: &impl CommandRunner,
    source: &Path,
    target: &Path,
) -> Result<(), HsbError> {
    match rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!("rename crosses filesystems, falling back to mv");
            runner
                .run_checked(&CommandSpec::new("mv").path_arg(source).path_arg(target))
                .map(|_| ())
        }
        Err(e) => Err(HsbError::io("move", source, e)),
    }
}

/// True for any directory entry, including a symlink whose target is gone.
fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}
