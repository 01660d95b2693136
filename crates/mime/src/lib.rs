//! Byte-preserving MIME/XOP multipart parsing and splicing.
//!
//! The rewriter (in `docscan-rewriter`) reads a `multipart/related`
//! envelope once with [`multipart::parse`], decides what to do with each
//! part, and writes the result with [`splice::rebuild`]. Nothing in
//! between re-serializes a header or a body that doesn't need to
//! change.

pub mod content_type;
pub mod errors;
pub mod header;
pub mod multipart;
pub mod splice;

pub use errors::{ParserError, ParserResult};
pub use header::{remove_header_line, Header};
pub use multipart::{Envelope, RawPart};
pub use splice::PartEdit;

/// Normalize a `Content-ID` header value via
/// [`docscan_common::extract_id`].
#[must_use]
pub fn content_id_of(raw: &str) -> String {
    docscan_common::extract_id(raw)
}
