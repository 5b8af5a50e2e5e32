//! Export of the open index into a new, fully merged index
//!
//! The destination is created from scratch, every committed segment of the
//! source is copied in, and the result is merged down to a single segment
//! without deletions. The chosen encoding only changes the physical files.
//!
//! Export is not atomic. If it fails, whatever was written at the target is
//! unusable and should be removed by the operator.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::session::{Session, SessionError, SessionResult};
use crate::store::error::StoreError;
use crate::store::types::{Codec, Document};

/// Physical encoding of the exported index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Human-readable encoding, for diffing and debugging
    #[default]
    Text,
    /// Default native encoding
    Binary,
}

impl ExportMode {
    /// `bin` selects binary; anything else, or nothing, selects text
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("bin") | Some("binary") => ExportMode::Binary,
            _ => ExportMode::Text,
        }
    }

    pub fn codec(&self) -> Codec {
        match self {
            ExportMode::Text => Codec::Text,
            ExportMode::Binary => Codec::Binary,
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Text => write!(f, "text"),
            ExportMode::Binary => write!(f, "binary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub target: PathBuf,
    pub mode: ExportMode,
    pub num_docs: u32,
    pub segment_count: usize,
}

/// Export the session's committed index to `target`
pub fn export(session: &Session, target: &Path, mode: ExportMode) -> SessionResult<ExportSummary> {
    let factory = session.directory();
    let source = factory.location();
    let fail = |e: StoreError| SessionError::ExportFailure(format!("{}: {}", target.display(), e));

    tracing::info!(
        source = %source.display(),
        target = %target.display(),
        %mode,
        "Exporting index"
    );

    let mut writer = factory.create_index(target, mode.codec()).map_err(fail)?;

    // Engine-specific compensation: copied segments keep their own encoding
    // and a merge of one clean segment is a no-op, so the chosen encoding
    // only takes effect if the destination already holds a segment of its
    // own. This applies to both encodings, since the source may be in either.
    // The placeholder is deleted again before the final merge.
    writer.add_document(Document::new()).map_err(fail)?;
    writer.flush().map_err(fail)?;

    writer.add_indexes(source).map_err(fail)?;

    writer.delete_by_predicate(&mut |doc| doc == 0).map_err(fail)?;
    writer.force_merge(1).map_err(fail)?;

    let summary = ExportSummary {
        target: target.to_path_buf(),
        mode,
        num_docs: writer.num_docs(),
        segment_count: writer.segment_count(),
    };
    writer.close().map_err(fail)?;

    tracing::info!(
        target = %target.display(),
        num_docs = summary.num_docs,
        segments = summary.segment_count,
        "Export complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::testing::{FakeFactory, FakeIndex};
    use crate::handle::{IndexHandleFactory, IndexWriter};
    use crate::session::SessionOptions;
    use crate::store::commit::SegmentInfos;
    use crate::store::{Field, FsDirectory};
    use tempfile::tempdir;

    /// Three segments of 10 docs, with the `color:red` docs deleted
    fn source_index(path: &Path) {
        let mut writer = FsDirectory::create(path, Codec::Binary, 10).unwrap();
        for i in 0..30 {
            let color = if i % 3 == 0 { "red" } else { "blue" };
            writer
                .add_document(
                    Document::new()
                        .with(Field::numeric_doc_value("id", i))
                        .with(Field::string("color", color))
                        .with(Field::text("contents", format!("{} car", color))),
                )
                .unwrap();
        }
        writer.commit().unwrap();
        writer.delete_by_term("color", "red").unwrap();
        Box::new(writer).close().unwrap();
    }

    fn open_session(path: &Path) -> Session {
        Session::open(
            Box::new(FsDirectory::open(path).unwrap()),
            SessionOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_export_mode_args() {
        assert_eq!(ExportMode::from_arg(None), ExportMode::Text);
        assert_eq!(ExportMode::from_arg(Some("text")), ExportMode::Text);
        assert_eq!(ExportMode::from_arg(Some("bin")), ExportMode::Binary);
    }

    #[test]
    fn test_text_export_keeps_live_docs() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        source_index(source.path());
        let session = open_session(source.path());
        let live = session.get_reader().num_docs();
        assert_eq!(live, 20);

        let summary = export(&session, target.path(), ExportMode::Text).unwrap();
        assert_eq!(summary.num_docs, 20);
        assert_eq!(summary.segment_count, 1);

        let exported = FsDirectory::open(target.path()).unwrap();
        let reader = exported.open_reader().unwrap();
        assert_eq!(reader.num_docs(), live);
        assert_eq!(reader.num_deleted_docs(), 0);
        assert_eq!(reader.leaves().len(), 1);
        assert_eq!(
            exported.latest_commit().unwrap().codec.as_deref(),
            Some("SimpleText")
        );

        let infos = SegmentInfos::read_latest(target.path()).unwrap();
        let seg_file = target.path().join(format!("{}.seg", infos.segments[0].name));
        let text = std::fs::read_to_string(seg_file).unwrap();
        assert!(text.starts_with("SGST"));
    }

    #[test]
    fn test_text_export_of_single_clean_segment() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        {
            let mut writer = FsDirectory::create(source.path(), Codec::Binary, 100).unwrap();
            for i in 0..5 {
                writer
                    .add_document(Document::new().with(Field::numeric_doc_value("id", i)))
                    .unwrap();
            }
            Box::new(writer).close().unwrap();
        }
        let session = open_session(source.path());

        export(&session, target.path(), ExportMode::Text).unwrap();
        let exported = FsDirectory::open(target.path()).unwrap();
        assert_eq!(exported.open_reader().unwrap().num_docs(), 5);
        assert_eq!(
            exported.latest_commit().unwrap().codec.as_deref(),
            Some("SimpleText")
        );
    }

    #[test]
    fn test_binary_export() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        source_index(source.path());
        let session = open_session(source.path());

        let summary = export(&session, target.path(), ExportMode::Binary).unwrap();
        assert_eq!(summary.num_docs, 20);

        let exported = FsDirectory::open(target.path()).unwrap();
        let commit = exported.latest_commit().unwrap();
        assert_eq!(commit.codec.as_deref(), Some("Lz4Binary"));
        assert_eq!(commit.segment_count, 1);
    }

    #[test]
    fn test_binary_export_of_text_index() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        {
            let mut writer = FsDirectory::create(source.path(), Codec::Text, 100).unwrap();
            for i in 0..5 {
                writer
                    .add_document(Document::new().with(Field::numeric_doc_value("id", i)))
                    .unwrap();
            }
            Box::new(writer).close().unwrap();
        }
        let session = open_session(source.path());

        let summary = export(&session, target.path(), ExportMode::Binary).unwrap();
        assert_eq!(summary.num_docs, 5);
        assert_eq!(summary.segment_count, 1);

        let exported = FsDirectory::open(target.path()).unwrap();
        let commit = exported.latest_commit().unwrap();
        assert_eq!(commit.codec.as_deref(), Some("Lz4Binary"));
        let reader = exported.open_reader().unwrap();
        assert_eq!(reader.num_docs(), 5);
        assert_eq!(reader.num_deleted_docs(), 0);

        let infos = SegmentInfos::read_latest(target.path()).unwrap();
        let seg_file = target.path().join(format!("{}.seg", infos.segments[0].name));
        assert!(std::fs::read(seg_file).unwrap().starts_with(b"SGSB"));
    }

    #[test]
    fn test_export_of_empty_index() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        Box::new(FsDirectory::create(source.path(), Codec::Binary, 10).unwrap())
            .close()
            .unwrap();
        let session = open_session(source.path());

        let summary = export(&session, target.path(), ExportMode::Binary).unwrap();
        assert_eq!(summary.num_docs, 0);
        assert_eq!(summary.segment_count, 0);
    }

    #[test]
    fn test_export_overwrites_target() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        source_index(source.path());
        let session = open_session(source.path());

        export(&session, target.path(), ExportMode::Binary).unwrap();
        export(&session, target.path(), ExportMode::Text).unwrap();

        let exported = FsDirectory::open(target.path()).unwrap();
        assert_eq!(exported.open_reader().unwrap().num_docs(), 20);
    }

    #[test]
    fn test_export_onto_source_fails() {
        let source = tempdir().unwrap();
        source_index(source.path());
        let session = open_session(source.path());

        let err = export(&session, source.path(), ExportMode::Text).unwrap_err();
        assert!(matches!(err, SessionError::ExportFailure(_)));
        assert_eq!(session.get_reader().num_docs(), 20);
    }

    #[test]
    fn test_export_failure_is_reported() {
        let session = Session::open(
            Box::new(FakeFactory::new(FakeIndex::with_doc_counts(&[3]))),
            SessionOptions::default(),
        )
        .unwrap();
        let target = tempdir().unwrap();

        assert!(matches!(
            export(&session, target.path(), ExportMode::Binary),
            Err(SessionError::ExportFailure(_))
        ));
    }
}
