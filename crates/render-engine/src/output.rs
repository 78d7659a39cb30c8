//! Output path resolution and atomic file replacement.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use plateblur_common::error::PlateblurResult;

const DEFAULT_EXTENSION: &str = "mp4";

/// Output path for `input`: `<stem><suffix>.<ext>` next to the input, or
/// inside `out_dir` when one is given.
///
/// A name without an extension gets `.mp4`.
pub fn default_output_path(input: &Path, out_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    let extension = input
        .extension()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(DEFAULT_EXTENSION));

    let mut name = stem;
    name.push(suffix);
    name.push(".");
    name.push(&extension);
    match out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Absolute form of `path` with symlinks resolved, as far as the file
/// system allows. A file that does not exist yet is resolved through its
/// parent directory.
pub(crate) fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Temporary sibling of `target` written while a file is being produced.
///
/// The extension is kept so the muxer still picks the right container.
pub fn partial_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    let mut name = stem;
    name.push(".partial");
    if let Some(ext) = target.extension() {
        name.push(".");
        name.push(ext);
    }
    target.with_file_name(name)
}

/// Owns the file the muxer writes to until it is committed.
///
/// In atomic mode the muxer writes to [`partial_path`]; [`commit`] renames it
/// over the target. Dropping an uncommitted guard removes whatever was written.
///
/// [`commit`]: OutputGuard::commit
#[derive(Debug)]
pub struct OutputGuard {
    target: PathBuf,
    write_path: PathBuf,
    committed: bool,
}

impl OutputGuard {
    pub fn new(target: &Path, atomic: bool) -> PlateblurResult<Self> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let write_path = if atomic {
            partial_path(target)
        } else {
            target.to_path_buf()
        };
        Ok(Self {
            target: target.to_path_buf(),
            write_path,
            committed: false,
        })
    }

    /// Path the muxer should open.
    pub fn write_path(&self) -> &Path {
        &self.write_path
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Move the finished file into place.
    pub fn commit(mut self) -> PlateblurResult<PathBuf> {
        if self.write_path != self.target {
            std::fs::rename(&self.write_path, &self.target)?;
        }
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.committed || !self.write_path.exists() {
            return;
        }
        match std::fs::remove_file(&self.write_path) {
            Ok(()) => tracing::debug!(path = %self.write_path.display(), "Removed incomplete output"),
            Err(e) => tracing::warn!(
                path = %self.write_path.display(),
                error = %e,
                "Failed to remove incomplete output"
            ),
        }
    }
}
