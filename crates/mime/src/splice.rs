//! Rebuilds a `multipart/related` envelope after some of its parts have
//! been replaced or removed, copying every unchanged byte straight from
//! the original buffer.

use crate::multipart::Envelope;

/// What happens to a single part on output.
#[derive(Debug, Clone)]
pub enum PartEdit {
    /// Copy the part's header block and body byte-for-byte.
    Keep,
    /// Copy the header block, substitute the body.
    Replace(Vec<u8>),
    /// Substitute both the header block and the body, e.g. to drop the
    /// `MIME-Version` header from a mutated SOAP part.
    ReplaceHeadersAndBody(Vec<u8>, Vec<u8>),
    /// Drop the part (header block and body) entirely.
    Remove,
}

/// Rebuild the envelope. `edits` must have one entry per
/// `envelope.parts` entry, in order.
///
/// # Panics
///
/// Panics if `edits.len() != envelope.parts.len()`; this is a
/// programmer error in the caller, not a malformed-input condition.
#[must_use]
pub fn rebuild(buffer: &[u8], envelope: &Envelope, boundary: &str, edits: &[PartEdit]) -> Vec<u8> {
    assert_eq!(edits.len(), envelope.parts.len());

    let mut out = Vec::with_capacity(buffer.len());
    out.extend_from_slice(&buffer[envelope.preamble.clone()]);

    for (part, edit) in envelope.parts.iter().zip(edits) {
        if matches!(edit, PartEdit::Remove) {
            continue;
        }

        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match edit {
            PartEdit::Keep => {
                out.extend_from_slice(&buffer[part.header_block.clone()]);
                out.extend_from_slice(&buffer[part.body.clone()]);
            }
            PartEdit::Replace(bytes) => {
                out.extend_from_slice(&buffer[part.header_block.clone()]);
                out.extend_from_slice(bytes);
            }
            PartEdit::ReplaceHeadersAndBody(headers, bytes) => {
                out.extend_from_slice(headers);
                out.extend_from_slice(bytes);
            }
            PartEdit::Remove => unreachable!("filtered out above"),
        }
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(&buffer[envelope.end_boundary_start..]);
    out
}
