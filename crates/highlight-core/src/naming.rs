//! Combined output naming and discovery
//!
//! Each source document has exactly one cumulative output,
//! `highlight_evidence_<stem>_combined.pdf`, in a caller-chosen directory.
//! Consumers find outputs by that pattern, newest first.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const PREFIX: &str = "highlight_evidence_";
const SUFFIX: &str = "_combined.pdf";

/// File name of the combined output for `source`.
pub fn combined_output_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{PREFIX}{stem}{SUFFIX}")
}

pub fn combined_output_path(workdir: &Path, source: &Path) -> PathBuf {
    workdir.join(combined_output_name(source))
}

fn is_highlight_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(PREFIX) && n.ends_with(".pdf"))
        .unwrap_or(false)
}

/// Every `highlight_evidence_*.pdf` in `workdir`, most recently modified first.
///
/// An unreadable directory yields nothing.
pub fn find_combined_outputs(workdir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(workdir) else {
        return Vec::new();
    };
    let mut found: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_highlight_output(path))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    found.into_iter().map(|(_, path)| path).collect()
}

/// The combined output for `source`, if one has been written.
pub fn latest_combined_output(workdir: &Path, source: &Path) -> Option<PathBuf> {
    let name = combined_output_name(source);
    find_combined_outputs(workdir)
        .into_iter()
        .find(|path| path.file_name().and_then(|n| n.to_str()) == Some(name.as_str()))
}
