//! Byte-exact splitting of a `multipart/related` MIME envelope.
//!
//! This does not build a tree and does not re-serialize anything: each
//! part is recorded as a set of byte ranges into the original buffer.
//! The rewriter in [`crate::splice`] copies unchanged ranges verbatim
//! and substitutes only the bodies that need to change, so a message
//! that needs no rewriting round-trips byte-for-byte.

use crate::errors::{ParserError, ParserResult};
use crate::header::{self, Header};

/// One MIME part located between two boundary delimiter lines.
#[derive(Debug, Clone)]
pub struct RawPart {
    /// Parsed headers, for looking up `Content-ID` / `Content-Type`.
    pub headers: Vec<Header>,
    /// Byte range covering the raw header lines and the blank line that
    /// ends them, copied verbatim on output so header formatting (casing,
    /// parameter order, folding) is never disturbed.
    pub header_block: std::ops::Range<usize>,
    /// Byte range of the body, i.e. everything after the blank line that
    /// ends the headers and before the `\r\n` that precedes the next
    /// boundary delimiter.
    pub body: std::ops::Range<usize>,
}

impl RawPart {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Normalized `Content-ID`, if present.
    #[must_use]
    pub fn content_id(&self) -> Option<String> {
        self.header("Content-ID").map(|h| crate::content_id_of(h.body()))
    }

    /// `Content-Type` body, e.g. `application/pdf`.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type").map(Header::body)
    }
}

/// A parsed `multipart/related` envelope: ranges for the preamble, every
/// part, and the epilogue, all within one shared buffer.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub preamble: std::ops::Range<usize>,
    pub parts: Vec<RawPart>,
    /// Byte offset where the terminating `--boundary--` line starts.
    pub end_boundary_start: usize,
}

/// Parse `buffer` as a `multipart/related` body delimited by `boundary`
/// (the bare token, without the leading `--`).
pub fn parse(buffer: &[u8], boundary: &str) -> ParserResult<Envelope> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut matches = Vec::new();
    for idx in memchr::memmem::find_iter(buffer, delimiter) {
        let at_line_start = idx == 0 || (idx >= 2 && &buffer[idx - 2..idx] == b"\r\n");
        if !at_line_start {
            continue;
        }
        let after = idx + delimiter.len();
        let is_end = buffer.get(after..after + 2) == Some(b"--");
        matches.push((idx, is_end));
    }

    let first = matches
        .first()
        .ok_or_else(|| ParserError::BoundaryNotFound(boundary.to_string()))?;
    let preamble = 0..first.0;

    let end_idx = matches
        .iter()
        .position(|(_, is_end)| *is_end)
        .ok_or(ParserError::UnterminatedMultipart)?;

    let mut parts = Vec::with_capacity(end_idx);
    for window in matches[..=end_idx].windows(2) {
        let (delim_start, _) = window[0];
        let (next_start, _) = window[1];

        let delim_end = delim_start + delimiter.len();
        let line_end = skip_crlf(buffer, delim_end);
        let segment = line_end..next_start;

        parts.push(parse_part(buffer, segment)?);
    }

    Ok(Envelope {
        preamble,
        parts,
        end_boundary_start: matches[end_idx].0,
    })
}

fn skip_crlf(buffer: &[u8], idx: usize) -> usize {
    if buffer.get(idx..idx + 2) == Some(b"\r\n") {
        idx + 2
    } else {
        idx
    }
}

fn parse_part(buffer: &[u8], segment: std::ops::Range<usize>) -> ParserResult<RawPart> {
    let slice = &buffer[segment.clone()];
    let sep = memchr::memmem::find(slice, b"\r\n\r\n").ok_or_else(|| {
        ParserError::MalformedHeaders("no header/body separator found in part".to_string())
    })?;

    let header_block = std::str::from_utf8(&slice[..sep])
        .map_err(|e| ParserError::MalformedHeaders(e.to_string()))?;
    let headers = header::parse_headers(header_block);

    let body_start = segment.start + sep + 4;
    let body_end = if segment.end >= 2 && &buffer[segment.end - 2..segment.end] == b"\r\n" {
        segment.end - 2
    } else {
        segment.end
    };

    Ok(RawPart {
        headers,
        header_block: segment.start..body_start,
        body: body_start..body_end.max(body_start),
    })
}

#[cfg(test)]
mod tests {
    use super::parse;
    use pretty_assertions::assert_eq;

    const BOUNDARY: &str = "MIME_boundary";

    fn sample() -> Vec<u8> {
        [
            "preamble text\r\n",
            "--MIME_boundary\r\n",
            "Content-Type: application/xop+xml\r\n",
            "Content-ID: <root.message@k>\r\n",
            "\r\n",
            "<soap/>",
            "\r\n",
            "--MIME_boundary\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-ID: <doc1@k>\r\n",
            "\r\n",
            "%PDF-1.4 bytes",
            "\r\n",
            "--MIME_boundary--\r\n",
        ]
        .concat()
        .into_bytes()
    }

    #[test]
    fn splits_preamble_parts_and_end_boundary() {
        let buf = sample();
        let envelope = parse(&buf, BOUNDARY).unwrap();
        assert_eq!(&buf[envelope.preamble.clone()], b"preamble text\r\n");
        assert_eq!(envelope.parts.len(), 2);
        assert_eq!(&buf[envelope.parts[0].body.clone()], b"<soap/>");
        assert_eq!(&buf[envelope.parts[1].body.clone()], b"%PDF-1.4 bytes");
    }

    #[test]
    fn exposes_content_id_and_content_type() {
        let buf = sample();
        let envelope = parse(&buf, BOUNDARY).unwrap();
        assert_eq!(envelope.parts[1].content_id().as_deref(), Some("doc1"));
        assert_eq!(envelope.parts[1].content_type(), Some("application/pdf"));
    }

    #[test]
    fn missing_boundary_is_an_error() {
        let buf = b"no boundary here".to_vec();
        assert!(parse(&buf, BOUNDARY).is_err());
    }
}
