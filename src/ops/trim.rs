//! Random trimming of an index
//!
//! Every live document is independently deleted with probability
//! `percent / 100`. The number deleted is therefore binomial, not an exact
//! share of the index: `trim 0` deletes nothing and `trim 100` deletes
//! everything, anything in between is approximate.

use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::session::{Session, SessionError, SessionResult};

/// A percentage in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPercent(u8);

impl TrimPercent {
    pub fn new(percent: i64) -> SessionResult<Self> {
        if (0..=100).contains(&percent) {
            Ok(TrimPercent(percent as u8))
        } else {
            Err(SessionError::InvalidArgument(format!(
                "invalid percent: {}",
                percent
            )))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl FromStr for TrimPercent {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let percent: i64 = s
            .trim()
            .parse()
            .map_err(|_| SessionError::InvalidArgument(format!("invalid percent: {}", s)))?;
        Self::new(percent)
    }
}

impl fmt::Display for TrimPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// What a trim did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimOutcome {
    Trimmed { deleted: u64, num_docs: u32 },
    /// No write access; nothing was changed
    WriterUnavailable(String),
}

/// Predicate matching each document with probability `percent / 100`
///
/// One draw from `[0, 100)` per call.
pub fn sampling_predicate<'a, R: Rng>(
    percent: TrimPercent,
    rng: &'a mut R,
) -> impl FnMut(u32) -> bool + 'a {
    move |_doc| rng.gen_range(0..100u8) < percent.0
}

/// Delete a random sample of live documents, commit and refresh
pub fn trim<R: Rng>(
    session: &mut Session,
    percent: TrimPercent,
    rng: &mut R,
) -> SessionResult<TrimOutcome> {
    let writer = match session.writer() {
        Ok(writer) => writer,
        Err(SessionError::WriterUnavailable(reason)) => {
            tracing::warn!(%percent, reason = %reason, "Trim skipped");
            return Ok(TrimOutcome::WriterUnavailable(reason));
        }
        Err(e) => return Err(e),
    };

    let mut predicate = sampling_predicate(percent, rng);
    let deleted = writer.delete_by_predicate(&mut predicate)?;
    writer.commit()?;

    session.refresh()?;
    let num_docs = session.get_reader().num_docs();

    tracing::info!(%percent, deleted, num_docs, "Trimmed index");
    Ok(TrimOutcome::Trimmed { deleted, num_docs })
}
