//! Content-ID normalization: the single join key between a MIME
//! attachment's `Content-ID` header and an XOP `<Include href="…"/>`
//! reference.
//!
//! The same rule must be applied on both sides of the join, so it lives
//! here as a single function rather than being reimplemented by the MIME
//! parser and the XML walker separately.

/// Normalize a raw `Content-ID` header value or XOP `href` attribute into
/// the bare identifier used as a join key.
///
/// Steps, applied in order:
/// 1. URL-decode the input.
/// 2. Strip a leading `cid:`.
/// 3. If the remainder starts with `<`, drop the first and last
///    character (mirrors the reference implementation's unconditional
///    `id[1:-1]`, rather than only stripping a matching trailing `>`).
/// 4. Truncate at the first `@`, if any.
#[must_use]
pub fn extract_id(id: &str) -> String {
    let decoded = percent_encoding::percent_decode_str(id).decode_utf8_lossy();
    let mut id: &str = &decoded;

    if let Some(rest) = id.strip_prefix("cid:") {
        id = rest;
    }

    let stripped;
    if id.starts_with('<') && !id.is_empty() {
        let mut chars = id.chars();
        chars.next();
        chars.next_back();
        stripped = chars.as_str();
        id = stripped;
    }

    match id.find('@') {
        Some(at) => id[..at].to_string(),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::extract_id;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("cid:%3Cabc@d%3E", "abc")]
    #[case("<abc@d>", "abc")]
    #[case("abc@d", "abc")]
    #[case("abc", "abc")]
    #[case("cid:abc", "abc")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(extract_id(input), expected);
    }

    #[test]
    fn xml_and_mime_forms_agree() {
        assert_eq!(
            extract_id("cid:%3Cabc@d%3E"),
            extract_id("<abc@d>")
        );
    }
}
