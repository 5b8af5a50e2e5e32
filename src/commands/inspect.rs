//! Read-only inspection commands
//!
//! Document ids given to and printed by these commands are global ids, as
//! the reader numbers them (segment doc base plus segment-local id).

use std::collections::BTreeMap;
use std::io::Write;

use super::{display_bytes, display_term, split_field, Command};
use crate::config::TermDisplay;
use crate::handle::IndexReader;
use crate::session::{Session, SessionError};
use crate::store::types::DocValue;

/// Docs shown by `docval` and `norm` when no doc is given
const DEFAULT_DOC_LIMIT: usize = 20;

pub struct GetUserCommitCommand;

impl Command for GetUserCommitCommand {
    fn name(&self) -> &str {
        "getusercommit"
    }

    fn help(&self) -> &str {
        "gets user commit data"
    }

    fn execute(&self, session: &mut Session, _args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let commit = session.directory().latest_commit()?;
        if commit.user_data.is_empty() {
            writeln!(out, "no user commit data")?;
            return Ok(());
        }
        for (key, value) in &commit.user_data {
            writeln!(out, "{} -> {}", key, value)?;
        }
        Ok(())
    }
}

pub struct TermsCommand;

impl Command for TermsCommand {
    fn name(&self) -> &str {
        "terms"
    }

    fn help(&self) -> &str {
        "gets terms from the index, <field:term prefix>"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(arg) = args.first() else {
            writeln!(out, "usage: terms <field>[:<prefix>]")?;
            return Ok(());
        };
        let (field, prefix) = split_field(arg).unwrap_or((arg.as_str(), ""));

        let reader = session.get_reader();
        let mut doc_freqs: BTreeMap<String, u32> = BTreeMap::new();
        for leaf in reader.leaves() {
            for (term, df) in leaf.term_doc_freqs(field) {
                if term.starts_with(prefix) {
                    *doc_freqs.entry(term).or_insert(0) += df;
                }
            }
        }

        let display = session.term_display();
        for (term, df) in &doc_freqs {
            writeln!(out, "{} ({})", display_term(term, display), df)?;
        }
        Ok(())
    }
}

pub struct PostingsCommand;

impl Command for PostingsCommand {
    fn name(&self) -> &str {
        "postings"
    }

    fn help(&self) -> &str {
        "iterating postings given a term, e.g. <fieldname:fieldvalue>"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some((field, term)) = args.first().and_then(|a| split_field(a)) else {
            writeln!(out, "usage: postings <field>:<term>")?;
            return Ok(());
        };

        let reader = session.get_reader();
        let mut found = 0usize;
        for leaf in reader.leaves() {
            let Some(postings) = leaf.postings(field, term) else {
                continue;
            };
            for posting in postings.iter().filter(|p| leaf.is_live(p.doc)) {
                found += 1;
                write!(
                    out,
                    "doc: {}, freq: {}",
                    leaf.doc_base() + posting.doc,
                    posting.freq
                )?;
                if !posting.positions.is_empty() {
                    write!(out, ", positions: {:?}", posting.positions)?;
                }
                writeln!(out)?;
            }
        }

        if found == 0 {
            let display = session.term_display();
            writeln!(out, "no postings for {}:{}", field, display_term(term, display))?;
        }
        Ok(())
    }
}

pub struct DocValCommand;

impl Command for DocValCommand {
    fn name(&self) -> &str {
        "docval"
    }

    fn help(&self) -> &str {
        "gets doc value for a given doc, <field> <docid>, if <docid> not specified, all docs are shown"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(field) = args.first() else {
            writeln!(out, "usage: docval <field> [doc]")?;
            return Ok(());
        };
        let reader = session.get_reader();
        let display = session.term_display();

        let docs = match args.get(1) {
            Some(doc) => vec![parse_doc(doc, reader.as_ref())?],
            None => first_live_docs(reader.as_ref(), DEFAULT_DOC_LIMIT),
        };

        for doc in docs {
            let value = reader
                .leaf_for_doc(doc)
                .and_then(|(leaf, local)| leaf.doc_value(field, local));
            match value {
                Some(value) => writeln!(out, "doc: {}, val: {}", doc, format_doc_value(&value, display))?,
                None => writeln!(out, "doc: {}, no doc value for field {}", doc, field)?,
            }
        }
        Ok(())
    }
}

pub struct StoredCommand;

impl Command for StoredCommand {
    fn name(&self) -> &str {
        "stored"
    }

    fn help(&self) -> &str {
        "displays stored data for a given doc, <docid>"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(arg) = args.first() else {
            writeln!(out, "usage: stored <doc>")?;
            return Ok(());
        };
        let reader = session.get_reader();
        let doc = parse_doc(arg, reader.as_ref())?;

        let stored = reader
            .leaf_for_doc(doc)
            .and_then(|(leaf, local)| leaf.stored_fields(local))
            .unwrap_or_default();
        if stored.is_empty() {
            writeln!(out, "no stored fields for doc: {}", doc)?;
        }
        for field in stored {
            writeln!(out, "{}: {}", field.name, field.value)?;
        }
        Ok(())
    }
}

pub struct NormCommand;

impl Command for NormCommand {
    fn name(&self) -> &str {
        "norm"
    }

    fn help(&self) -> &str {
        "displays norm values for a field for a list of documents, <field> [docid]"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let Some(field) = args.first() else {
            writeln!(out, "usage: norm <field> [doc]")?;
            return Ok(());
        };
        let reader = session.get_reader();

        let docs = match args.get(1) {
            Some(doc) => vec![parse_doc(doc, reader.as_ref())?],
            None => first_live_docs(reader.as_ref(), DEFAULT_DOC_LIMIT),
        };

        for doc in docs {
            let norm = reader
                .leaf_for_doc(doc)
                .and_then(|(leaf, local)| leaf.norm(field, local));
            match norm {
                Some(norm) => writeln!(out, "doc: {}, norm: {}", doc, norm)?,
                None => writeln!(out, "doc: {}, no norm for field {}", doc, field)?,
            }
        }
        Ok(())
    }
}

pub struct TermVectorCommand;

impl Command for TermVectorCommand {
    fn name(&self) -> &str {
        "tv"
    }

    fn help(&self) -> &str {
        "shows term vector of a field for a doc, <field> <docid>"
    }

    fn execute(&self, session: &mut Session, args: &[String], out: &mut dyn Write) -> anyhow::Result<()> {
        let (Some(field), Some(arg)) = (args.first(), args.get(1)) else {
            writeln!(out, "usage: tv <field> <doc>")?;
            return Ok(());
        };
        let reader = session.get_reader();
        let doc = parse_doc(arg, reader.as_ref())?;
        let display = session.term_display();

        let Some(entries) = reader
            .leaf_for_doc(doc)
            .and_then(|(leaf, local)| leaf.term_vector(field, local))
        else {
            writeln!(out, "no term vector for field {} in doc: {}", field, doc)?;
            return Ok(());
        };

        for entry in entries {
            write!(out, "{} (freq: {})", display_term(&entry.term, display), entry.freq)?;
            if !entry.positions.is_empty() {
                write!(out, ", positions: {:?}", entry.positions)?;
            }
            if !entry.offsets.is_empty() {
                let offsets: Vec<String> = entry
                    .offsets
                    .iter()
                    .map(|(start, end)| format!("{}-{}", start, end))
                    .collect();
                write!(out, ", offsets: [{}]", offsets.join(", "))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

/// Parse a global doc id, which must be below the reader's `max_doc`
fn parse_doc(arg: &str, reader: &dyn IndexReader) -> Result<u32, SessionError> {
    let max_doc = reader.max_doc();
    match arg.parse::<u32>() {
        Ok(doc) if doc < max_doc => Ok(doc),
        _ => Err(SessionError::InvalidArgument(format!(
            "doc id must be a number between 0 and {}, got {}",
            max_doc as i64 - 1,
            arg
        ))),
    }
}

/// Up to `limit` live global doc ids, in order
fn first_live_docs(reader: &dyn IndexReader, limit: usize) -> Vec<u32> {
    reader
        .leaves()
        .into_iter()
        .flat_map(|leaf| {
            (0..leaf.max_doc())
                .filter(move |&doc| leaf.is_live(doc))
                .map(move |doc| leaf.doc_base() + doc)
        })
        .take(limit)
        .collect()
}

fn format_doc_value(value: &DocValue, display: TermDisplay) -> String {
    match value {
        DocValue::Numeric(v) => v.to_string(),
        DocValue::Binary(bytes) | DocValue::Sorted(bytes) => display_bytes(bytes, display),
        DocValue::SortedNumeric(values) => format!("{:?}", values),
        DocValue::SortedSet(values) => {
            let values: Vec<String> = values.iter().map(|v| display_bytes(v, display)).collect();
            format!("[{}]", values.join(", "))
        }
    }
}
