//! Cumulative output persistence
//!
//! The combined output is rewritten whole on every commit: the base document
//! (the existing output if there is one, else the source) is loaded, annotated
//! in memory, saved to a temp file next to the output and renamed over it.
//! Until the rename, the previous output is untouched.

use crate::error::{HighlightError, Result};
use lopdf::Document;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Where a base document was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseOrigin {
    Source,
    ExistingOutput,
}

/// A document about to receive more highlights.
#[derive(Debug)]
pub struct BaseDocument {
    pub doc: Document,
    pub path: PathBuf,
    pub origin: BaseOrigin,
}

pub fn open_document(path: &Path) -> Result<Document> {
    Document::load(path).map_err(|e| HighlightError::open(path, e))
}

/// Load the existing output if present, otherwise the pristine source.
pub fn open_base(source: &Path, output: &Path) -> Result<BaseDocument> {
    let (path, origin) = if output.is_file() {
        (output, BaseOrigin::ExistingOutput)
    } else {
        (source, BaseOrigin::Source)
    };
    debug!(path = %path.display(), ?origin, "Opening base document");
    Ok(BaseDocument {
        doc: open_document(path)?,
        path: path.to_path_buf(),
        origin,
    })
}

/// Drop unreachable objects and deflate streams.
pub fn compact(doc: &mut Document) {
    let pruned = doc.prune_objects();
    if !pruned.is_empty() {
        debug!(count = pruned.len(), "Pruned unreachable objects");
    }
    doc.compress();
}

/// A fully written document waiting to replace its target.
///
/// Dropping it without [`StagedOutput::commit`] removes the temp file and
/// leaves the target as it was.
#[derive(Debug)]
pub struct StagedOutput {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedOutput {
    pub fn staged_path(&self) -> &Path {
        self.file.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Atomically replace the target with the staged file.
    pub fn commit(self) -> Result<()> {
        let StagedOutput { file, target } = self;
        file.persist(&target)
            .map_err(|e| HighlightError::persist(&target, e.error))?;
        debug!(path = %target.display(), "Committed output");
        Ok(())
    }
}

fn output_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Compact `doc` and write it to a temp file in the output's directory.
pub fn stage(doc: &mut Document, output: &Path) -> Result<StagedOutput> {
    compact(doc);

    let mut file = tempfile::Builder::new()
        .prefix(".highlight_")
        .suffix(".pdf")
        .tempfile_in(output_dir(output))
        .map_err(|e| HighlightError::persist(output, e))?;

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        doc.save_to(&mut writer)
            .map_err(|e| HighlightError::persist(output, e))?;
        writer
            .flush()
            .map_err(|e| HighlightError::persist(output, e))?;
    }
    file.as_file()
        .sync_all()
        .map_err(|e| HighlightError::persist(output, e))?;

    Ok(StagedOutput {
        file,
        target: output.to_path_buf(),
    })
}

/// Stage and commit in one step.
pub fn save_atomic(doc: &mut Document, output: &Path) -> Result<()> {
    stage(doc, output)?.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::tests::create_test_pdf;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_base_prefers_existing_output() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.pdf");
        let output = dir.path().join("out.pdf");
        create_test_pdf().save(&source).unwrap();

        let base = open_base(&source, &output).unwrap();
        assert_eq!(base.origin, BaseOrigin::Source);

        create_test_pdf().save(&output).unwrap();
        let base = open_base(&source, &output).unwrap();
        assert_eq!(base.origin, BaseOrigin::ExistingOutput);
        assert_eq!(base.path, output);
    }

    #[test]
    fn test_missing_source_is_document_open_error() {
        let dir = TempDir::new().unwrap();
        let err = open_base(&dir.path().join("nope.pdf"), &dir.path().join("out.pdf")).unwrap_err();
        assert!(matches!(err, HighlightError::DocumentOpen { .. }));
    }

    #[test]
    fn test_commit_writes_loadable_document() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.pdf");
        save_atomic(&mut create_test_pdf(), &output).unwrap();

        let doc = Document::load(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_uncommitted_stage_leaves_prior_output_intact() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.pdf");
        save_atomic(&mut create_test_pdf(), &output).unwrap();
        let before = fs::read(&output).unwrap();

        let staged = stage(&mut create_test_pdf(), &output).unwrap();
        let staged_path = staged.staged_path().to_path_buf();
        assert!(staged_path.exists());
        assert_eq!(staged_path.parent(), output.parent());
        drop(staged);

        assert!(!staged_path.exists());
        assert_eq!(fs::read(&output).unwrap(), before);
    }

    #[test]
    fn test_failed_rename_is_persist_error() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.pdf");
        fs::create_dir(&output).unwrap();
        fs::write(output.join("keep.txt"), b"x").unwrap();

        let staged = stage(&mut create_test_pdf(), &output).unwrap();
        let staged_path = staged.staged_path().to_path_buf();
        let err = staged.commit().unwrap_err();

        assert!(matches!(err, HighlightError::Persist { .. }));
        assert!(!staged_path.exists());
        assert!(output.join("keep.txt").exists());
    }
}
