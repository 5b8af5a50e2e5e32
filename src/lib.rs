//! # segscope
//!
//! Interactive administration shell for segmented inverted/columnar indexes.
//!
//! Open an index, browse per-segment and per-field statistics, look at
//! postings, doc values, stored fields and term vectors, and make a few
//! controlled changes (random trimming, deletes, merges, commit data edits,
//! export to a fresh single-segment index) without writing code against the
//! index library.
//!
//! ## Modules
//!
//! - [`session`]: the session controller and command dispatch
//! - [`commands`]: the built-in shell commands
//! - [`ops`]: field statistics roll-up, trimming and export
//! - [`handle`]: capability traits the session works through
//! - [`store`]: the on-disk segmented index engine
//! - [`shell`]: interactive and scripted command loops
//! - [`sample`]: sample index builder
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segscope::session::{Session, SessionOptions};
//! use segscope::store::FsDirectory;
//!
//! fn main() -> anyhow::Result<()> {
//!     let directory = FsDirectory::open("/var/lib/search/index")?;
//!     let mut session = Session::open(Box::new(directory), SessionOptions::default())?;
//!
//!     let mut out = std::io::stdout();
//!     session.dispatch("info", &mut out);
//!     session.dispatch("terms color_indexed", &mut out);
//!
//!     session.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod handle;
pub mod ops;
pub mod sample;
pub mod session;
pub mod shell;
pub mod store;

pub use config::{Config, ConfigError, LoggingConfig, ShellConfig, StoreConfig, TermDisplay};
pub use handle::{
    CommitInfo, IndexHandleFactory, IndexReader, IndexWriter, LeafReader, Stat, TermStats,
};
pub use session::{Flow, Session, SessionError, SessionOptions, SessionResult};
pub use shell::Shell;
pub use store::{FsDirectory, StoreError, StoreResult};
