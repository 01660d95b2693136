//! Minimal header/parameter model used to read `Content-Type` and
//! `Content-ID` values. Unlike the teacher's mail parser, headers here
//! are read-only views: the rewriter never re-serializes a header, it
//! only decides which byte ranges of the original buffer to keep or
//! replace.

use std::str::FromStr;

/// A single `Name: body;arg=value;...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    body: String,
    args: Vec<Arg>,
}

/// One `;name=value` parameter of a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    name: String,
    value: String,
}

impl Header {
    /// Parse a raw `name: value` line (without the trailing CRLF).
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (name, rest) = line.split_once(':')?;
        let mut fields = rest.split(';');
        let body = fields.next().unwrap_or("").trim().to_string();
        let args = fields.filter_map(Arg::from_str_lossy).collect();
        Some(Self {
            name: name.trim().to_string(),
            body,
            args,
        })
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn arg(&self, needle: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|arg| arg.name.eq_ignore_ascii_case(needle))
            .map(|arg| arg.value.as_str())
    }
}

impl Arg {
    fn from_str_lossy(raw: &str) -> Option<Self> {
        let (name, value) = raw.split_once('=')?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some(Self {
            name: name.trim().to_string(),
            value: value.to_string(),
        })
    }
}

/// Parse a `\r\n`-joined block of header lines (unfolded), as found
/// between a boundary delimiter and the blank line that starts a part's
/// body.
#[must_use]
pub fn parse_headers(block: &str) -> Vec<Header> {
    unfold(block).iter().filter_map(|line| Header::parse(line)).collect()
}

/// Drop every line (and its folded continuations) whose header name
/// matches `name`, case-insensitively. Returns the raw header block,
/// still `\r\n`-terminated line by line, suitable for splicing back into
/// a part in place of its original `header_block`.
#[must_use]
pub fn remove_header_line(block: &[u8], name: &str) -> Vec<u8> {
    let text = String::from_utf8_lossy(block);
    let mut out = String::new();
    for line in unfold(&text) {
        let keep = Header::parse(&line).map_or(true, |h| !h.name.eq_ignore_ascii_case(name));
        if keep {
            out.push_str(&line);
            out.push_str("\r\n");
        }
    }
    // `unfold` drops the blank line that ends the header block; restore it
    // so the result is still a valid `header_block` (headers + separator).
    out.push_str("\r\n");
    out.into_bytes()
}

/// Join folded continuation lines (leading whitespace) back onto the
/// header line they continue.
fn unfold(block: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in block.split("\r\n") {
        if raw.is_empty() {
            continue;
        }
        if (raw.starts_with(' ') || raw.starts_with('\t')) && !lines.is_empty() {
            let last = lines.last_mut().expect("checked non-empty above");
            last.push(' ');
            last.push_str(raw.trim_start());
        } else {
            lines.push(raw.to_string());
        }
    }
    lines
}
