//! Parsing of the top-level `Content-Type` header of a SOAP/XOP+MIME
//! response: `multipart/related; type=...; start=...; boundary=...`.

use crate::errors::{ParserError, ParserResult};
use crate::header::Header;

/// The parameters of the top-level `multipart/related` `Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevel {
    pub boundary: String,
    /// `start=` parameter: the Content-ID of the root (SOAP) part, when
    /// the server bothered to set it. Not trusted on its own: the SOAP
    /// part is identified by position and only cross-checked against
    /// this value.
    pub start: Option<String>,
}

/// Parse a raw `Content-Type` header value (the part after the colon).
pub fn parse(raw: &str) -> ParserResult<TopLevel> {
    let header = Header::parse(&format!("Content-Type:{raw}"))
        .ok_or_else(|| ParserError::MalformedHeaders("empty Content-Type header".to_string()))?;

    if !header.body().eq_ignore_ascii_case("multipart/related") {
        return Err(ParserError::MalformedHeaders(format!(
            "expected multipart/related, got {}",
            header.body()
        )));
    }

    let boundary = header
        .arg("boundary")
        .ok_or_else(|| ParserError::BoundaryNotFound("missing boundary= parameter".to_string()))?
        .to_string();

    let start = header
        .arg("start")
        .map(|id| docscan_common::extract_id(id));

    Ok(TopLevel { boundary, start })
}

#[cfg(test)]
mod tests {
    use super::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_boundary_and_start() {
        let top = parse(
            r#" multipart/related; type="application/xop+xml"; start="<root.message@k>"; start-info="application/soap+xml"; boundary="uuid:abc123""#,
        )
        .unwrap();
        assert_eq!(top.boundary, "uuid:abc123");
        assert_eq!(top.start.as_deref(), Some("root.message"));
    }

    #[test]
    fn rejects_non_multipart() {
        assert!(parse("text/xml").is_err());
    }

    #[test]
    fn missing_boundary_is_an_error() {
        assert!(parse(r#"multipart/related; type="application/xop+xml""#).is_err());
    }
}
