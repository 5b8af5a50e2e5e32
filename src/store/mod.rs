//! On-disk segmented index store
//!
//! A small segmented inverted/columnar engine that the shell operates on.
//!
//! Directory layout:
//! ```text
//! index/
//! ├── segments_3        newest commit (JSON): segment list + user data
//! ├── _0.seg            segment files, Lz4Binary or SimpleText
//! ├── _2.seg
//! ├── _0_1.del          deleted docs of _0, deletion generation 1
//! └── write.lock        held by the single open writer
//! ```
//!
//! Components:
//! - `codec`: binary (bincode + LZ4) and text (JSON) file encodings
//! - `segment`: segment content, builder and merger
//! - `commit`: commit points and file cleanup
//! - `reader`: point-in-time readers
//! - `writer`: the single writer
//! - `directory`: [`FsDirectory`], the handle factory over a directory

pub mod analysis;
pub mod codec;
pub mod commit;
pub mod directory;
pub mod error;
pub mod lock;
pub mod reader;
pub mod segment;
pub mod types;
pub mod writer;

pub use directory::FsDirectory;
pub use error::{StoreError, StoreResult};
pub use types::{Codec, Document, Field, FieldInfo, FieldValue};
pub use writer::{FsIndexWriter, OpenMode, WriterConfig};
