//! Metalink4 (RFC 5854) descriptors: the document model, SHA-256 whole-file
//! and piece hashing of local files, and XML render/read.
//!
//! Nothing here downloads; URLs are only recorded.

pub mod config;
pub mod document;
pub mod error;
pub mod file_entry;
pub mod hash;
pub mod mime;
pub mod url_entry;
pub mod validate;
pub mod verify;
pub mod xml;

pub use config::RenderConfig;
pub use document::Document;
pub use error::{Error, Result};
pub use file_entry::FileEntry;
pub use hash::{compute_hashes, ComputedHashes, FileHash, PiecePolicy};
pub use mime::{ContentTypeResolver, MimeGuessResolver};
pub use url_entry::{UrlEntry, UrlKind};
pub use verify::{verify_file, VerifyReport};
