//! Input path expansion.

use std::path::{Path, PathBuf};

/// Container extensions picked up when a directory is given.
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Expand command-line paths into the list of files to process.
///
/// Files are taken as given. Directories contribute their video files
/// (non-recursive, sorted by path). Anything else is reported and skipped.
pub fn collect_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_file() {
            inputs.push(path.clone());
        } else if path.is_dir() {
            match std::fs::read_dir(path) {
                Ok(entries) => {
                    let mut found: Vec<PathBuf> = entries
                        .filter_map(|entry| entry.ok().map(|e| e.path()))
                        .filter(|p| p.is_file() && is_video_file(p))
                        .collect();
                    found.sort();
                    if found.is_empty() {
                        tracing::warn!(path = %path.display(), "No video files in directory");
                    }
                    inputs.extend(found);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read directory");
                }
            }
        } else {
            tracing::warn!(path = %path.display(), "Invalid path; skipping");
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_extensions_are_case_insensitive() {
        assert!(is_video_file(Path::new("a.mp4")));
        assert!(is_video_file(Path::new("b.MOV")));
        assert!(is_video_file(Path::new("c.Mkv")));
        assert!(!is_video_file(Path::new("notes.txt")));
        assert!(!is_video_file(Path::new("mp4")));
    }

    #[test]
    fn test_directory_expansion_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.AVI", "c.txt", "d.mkv"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let inputs = collect_inputs(&[dir.path().to_path_buf()]);
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.AVI", "b.mp4", "d.mkv"]);
    }

    #[test]
    fn test_explicit_files_and_invalid_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.webm");
        std::fs::write(&file, b"").unwrap();
        let missing = dir.path().join("missing.mp4");

        let inputs = collect_inputs(&[missing, file.clone()]);
        assert_eq!(inputs, vec![file]);
    }
}
