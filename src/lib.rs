//! partmirror: live, editable mirrors of zip-based documents
//!
//! Every part of a container (an office package, an EPUB, any zip of XML
//! members) is materialized as a loose cache file next to the container.
//! Edits saved in the cache are written back into the container, and changes
//! made to the container from outside are pulled into the cache with the old
//! content kept for diffing.

pub mod cache;
pub mod codec;
pub mod concurrency;
pub mod config;
pub mod detect;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod session;
pub mod state;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod watch;
pub mod writer;

pub use codec::{ArchiveCodec, ArchiveSnapshot, ZipCodec};
pub use error::ApiError;
pub use session::Session;
pub use types::{ChangeKind, Role};
