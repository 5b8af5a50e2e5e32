//! `info [segment]`

use std::io::Write;

use super::Command;
use crate::ops::field_stats::{summarize_index, summarize_segment, FieldStatsAggregate};
use crate::session::{Session, SessionError};
use crate::store::types::IndexOptions;

pub struct InfoCommand;

impl Command for InfoCommand {
    fn name(&self) -> &str {
        "info"
    }

    fn help(&self) -> &str {
        "displays information about the index, <segment number> to get information on the segment"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let reader = session.get_reader();
        writeln!(out, "readonly mode: {}", session.is_read_only())?;

        // Codec comes from the newest commit on disk, not from the reader
        let commit = session.directory().latest_commit()?;
        if let Some(codec) = &commit.codec {
            writeln!(out, "Codec found: {}", codec)?;
        }

        let Some(arg) = args.first() else {
            let summary = summarize_index(reader.as_ref(), &commit);
            writeln!(out, "numdocs: {}", summary.num_docs)?;
            writeln!(out, "maxdoc: {}", summary.max_doc)?;
            writeln!(out, "num deleted docs: {}", summary.num_deleted_docs)?;
            writeln!(out, "segment count: {}", summary.segment_count)?;
            write_fields(&summary.fields, out)?;
            return Ok(());
        };

        let segment_count = reader.leaves().len();
        let ord = match arg.parse::<usize>() {
            Ok(ord) if ord < segment_count => ord,
            _ => {
                let err = SessionError::invalid_segment(arg.as_str(), segment_count);
                writeln!(out, "{}", err)?;
                return Ok(());
            }
        };

        let summary = summarize_segment(reader.as_ref(), ord)?;
        writeln!(out, "segment {}: ", summary.ord)?;
        writeln!(out, "doc base:\t{}", summary.doc_base)?;
        writeln!(out, "numdocs:\t{}", summary.num_docs)?;
        writeln!(out, "maxdoc:\t{}", summary.max_doc)?;
        writeln!(out, "num deleted docs:\t{}", summary.num_deleted_docs)?;
        write_fields(&summary.fields, out)?;
        Ok(())
    }
}

fn write_fields(fields: &[FieldStatsAggregate], out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "number of fields: {}", fields.len())?;
    for field in fields {
        write_field(field, out)?;
    }
    Ok(())
}

fn write_field(field: &FieldStatsAggregate, out: &mut dyn Write) -> std::io::Result<()> {
    let info = &field.info;
    writeln!(
        out,
        "=================================== Field {} ===================================",
        info.name
    )?;
    writeln!(out, "name:\t\t{}", info.name)?;
    writeln!(out, "docval_type:\t{}", info.doc_values)?;
    writeln!(out, "norms:\t\t{}", info.has_norms)?;
    if info.index_options != IndexOptions::None {
        writeln!(out, "index_options:\t{}", info.index_options)?;
    }
    writeln!(out, "payloads:\t{}", info.has_payloads)?;
    writeln!(out, "vectors:\t{}", info.has_vectors)?;

    let attributes: Vec<String> = info
        .attributes
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    writeln!(out, "attributes:\t{{{}}}", attributes.join(", "))?;

    let stats = &field.stats;
    writeln!(out, "num_terms:\t{}", stats.num_terms)?;
    writeln!(out, "doc_count:\t{}", stats.doc_count)?;
    writeln!(out, "sum_doc_freq:\t{}", stats.sum_doc_freq)?;
    writeln!(out, "sum_total_term_freq:\t{}", stats.sum_total_term_freq)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{car_index, open, run};
    use crate::handle::testing::{FakeFactory, FakeIndex, FakeSegment};
    use crate::session::SessionOptions;
    use tempfile::tempdir;

    fn fake_session(index: FakeIndex) -> Session {
        Session::open(Box::new(FakeFactory::new(index)), SessionOptions::default()).unwrap()
    }

    #[test]
    fn test_whole_index_header() {
        let mut session = fake_session(FakeIndex::with_doc_counts(&[100, 150, 200]));
        let output = run(&mut session, "info");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            &lines[..7],
            &[
                "readonly mode: true",
                "Codec found: Fake",
                "numdocs: 450",
                "maxdoc: 450",
                "num deleted docs: 0",
                "segment count: 3",
                "number of fields: 1",
            ]
        );
        assert!(output.contains("num_terms:\t450\n"));
        assert!(output.contains("sum_total_term_freq:\t1350\n"));
    }

    #[test]
    fn test_unknown_statistic_renders_minus_one() {
        let mut session = fake_session(FakeIndex::new(vec![
            FakeSegment::new(10).field("body", Some([5, 10, 20, 30])),
            FakeSegment::new(10).field("body", Some([5, 10, -1, 30])),
        ]));
        let output = run(&mut session, "info");
        assert!(output.contains("sum_doc_freq:\t-1\n"));
        assert!(output.contains("sum_total_term_freq:\t60\n"));
    }

    #[test]
    fn test_field_block_format() {
        let mut session = fake_session(FakeIndex::new(vec![
            FakeSegment::new(3).field("body", Some([1, 2, 3, 4]))
        ]));
        let output = run(&mut session, "info 0");
        let block = output
            .split("=================================== Field body ===================================\n")
            .nth(1)
            .unwrap();
        assert_eq!(
            block,
            "name:\t\tbody\n\
             docval_type:\tNONE\n\
             norms:\t\tfalse\n\
             payloads:\tfalse\n\
             vectors:\tfalse\n\
             attributes:\t{}\n\
             num_terms:\t1\n\
             doc_count:\t2\n\
             sum_doc_freq:\t3\n\
             sum_total_term_freq:\t4\n"
        );
    }

    #[test]
    fn test_segment_mode() {
        let mut session = fake_session(FakeIndex::with_doc_counts(&[100, 150]));
        let output = run(&mut session, "info 1");
        assert!(output.contains("segment 1: \n"));
        assert!(output.contains("doc base:\t100\n"));
        assert!(output.contains("numdocs:\t150\n"));
        assert!(output.contains("num deleted docs:\t0\n"));
    }

    #[test]
    fn test_invalid_segment() {
        let mut session = fake_session(FakeIndex::with_doc_counts(&[100, 150]));
        for arg in ["2", "-1", "x"] {
            let output = run(&mut session, &format!("info {}", arg));
            assert!(
                output.ends_with(&format!(
                    "segment id must be a number between 0 and 1, got {}\n",
                    arg
                )),
                "{}",
                output
            );
            assert!(!output.contains("number of fields"));
        }
    }

    #[test]
    fn test_on_disk_index() {
        let dir = tempdir().unwrap();
        car_index(dir.path());
        let mut session = open(dir.path(), true);

        let output = run(&mut session, "info");
        assert!(output.contains("Codec found: Lz4Binary\n"));
        assert!(output.contains("numdocs: 10\n"));
        assert!(output.contains("segment count: 2\n"));
        assert!(output.contains("index_options:\tDOCS_AND_FREQS_AND_POSITIONS\n"));
        assert!(output.contains("docval_type:\tSORTED\n"));
        assert!(output.contains("vectors:\ttrue\n"));
        assert!(output.contains("postings.format=Lz4Binary"));

        // DOCS-only string field does not record frequencies
        let color = output
            .split("Field color_indexed ")
            .nth(1)
            .unwrap();
        assert!(color.contains("index_options:\tDOCS\n"));
        assert!(color.contains("sum_total_term_freq:\t-1\n"));
    }
}
