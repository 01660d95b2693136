//! Loads the benign placeholder payloads used to replace infected
//! attachments, keyed by MIME type.
//!
//! Replacement files live in a single directory, named
//! `<mime-type-with-slashes-as-underscores>.<ext>`, e.g.
//! `application_pdf.pdf` for `application/pdf`. A `text/plain` entry is
//! mandatory: it is the fallback used whenever a document's declared
//! `mimeType` has no dedicated replacement.

use docscan_common::ProxyError;
use std::collections::HashMap;

const FALLBACK_MIME_TYPE: &str = "text/plain";

/// A single loaded placeholder payload.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// The full set of placeholder payloads, indexed by MIME type.
#[derive(Debug, Clone)]
pub struct ReplacementStore {
    entries: HashMap<String, Replacement>,
}

impl ReplacementStore {
    /// Load every file in `dir`, deriving each entry's MIME type from its
    /// file stem. Fails if the directory can't be read, or if no
    /// `text/plain` entry is present.
    pub fn load(dir: &std::path::Path) -> Result<Self, ProxyError> {
        let read_dir = std::fs::read_dir(dir)
            .map_err(|e| ProxyError::Config(format!("read replacement directory {}: {e}", dir.display())))?;

        let mut entries = HashMap::new();
        for entry in read_dir {
            let entry = entry
                .map_err(|e| ProxyError::Config(format!("read replacement directory {}: {e}", dir.display())))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let mime_type = stem_to_mime_type(stem);
            let bytes = std::fs::read(&path)
                .map_err(|e| ProxyError::Config(format!("read replacement file {}: {e}", path.display())))?;
            entries.insert(mime_type.clone(), Replacement { mime_type, bytes });
        }

        if !entries.contains_key(FALLBACK_MIME_TYPE) {
            return Err(ProxyError::Config(format!(
                "replacement directory {} has no `text/plain` fallback entry",
                dir.display()
            )));
        }

        Ok(Self { entries })
    }

    /// Look up the replacement for `mime_type`, falling back to
    /// `text/plain` when there is no dedicated entry.
    #[must_use]
    pub fn get(&self, mime_type: &str) -> Option<&Replacement> {
        self.entries
            .get(mime_type)
            .or_else(|| self.entries.get(FALLBACK_MIME_TYPE))
    }
}

/// `application_pdf` -> `application/pdf`. Every underscore becomes a
/// slash, matching the file-naming rule one-for-one.
fn stem_to_mime_type(stem: &str) -> String {
    stem.replace('_', "/")
}

#[cfg(test)]
mod tests {
    use super::{stem_to_mime_type, ReplacementStore};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_file(dir: &std::path::Path, name: &str, contents: &[u8]) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents).unwrap();
    }

    #[test]
    fn stem_conversion() {
        assert_eq!(stem_to_mime_type("application_pdf"), "application/pdf");
        assert_eq!(stem_to_mime_type("text_plain"), "text/plain");
    }

    #[test]
    fn loads_entries_and_falls_back_to_text_plain() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "text_plain.txt", b"infected, removed by proxy");
        write_file(dir.path(), "application_pdf.pdf", b"%PDF-1.4 placeholder");

        let store = ReplacementStore::load(dir.path()).unwrap();
        assert_eq!(store.get("application/pdf").unwrap().bytes, b"%PDF-1.4 placeholder");
        assert_eq!(
            store.get("image/png").unwrap().bytes,
            b"infected, removed by proxy"
        );
    }

    #[test]
    fn missing_fallback_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "application_pdf.pdf", b"placeholder");

        assert!(ReplacementStore::load(dir.path()).is_err());
    }
}
