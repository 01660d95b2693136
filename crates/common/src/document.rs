//! Per-document bookkeeping threaded through a single scan-and-rewrite
//! pass, and the overall status derived from it.

/// What happened to a single XOP-attached document during the rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Scanned clean; bytes left exactly as received.
    Untouched,
    /// Scanned infected and replaced in place with the configured
    /// replacement body for this MIME type.
    ReplacedWithPlaceholder {
        /// MIME type of the replacement body that was spliced in.
        mime_type: String,
    },
    /// Scanned infected and removed: the `DocumentResponse` entry is
    /// dropped from the SOAP body and the MIME part is cut out of the
    /// envelope.
    Removed,
}

impl RewriteOutcome {
    /// True when the backing bytes in the envelope were changed.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Untouched)
    }
}

/// One `DocumentResponse` entry, joined to its MIME part by Content-ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// `DocumentUniqueId` text content, used to build
    /// `XDSDocumentUniqueIdError` entries on removal.
    pub document_unique_id: Option<String>,
    /// `mimeType` text content as declared in the SOAP body, independent
    /// of the MIME part's own `Content-Type`.
    pub mime_type: Option<String>,
    /// Normalized Content-ID, as produced by
    /// [`crate::content_id::extract_id`], joining this entry to a MIME
    /// part's `Content-ID` header.
    pub content_id: String,
    /// What happened to this document's bytes.
    pub outcome: RewriteOutcome,
}

/// The aggregate result of scanning every document in one response,
/// driving which `RegistryResponse/@status` is spliced into the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallStatus {
    /// Every document was untouched.
    Unchanged,
    /// At least one document was untouched and at least one was
    /// replaced or removed.
    PartialSuccess,
    /// Every document was replaced or removed.
    Failure,
}

impl OverallStatus {
    /// Derive the aggregate status from the individual outcomes.
    ///
    /// An empty document set is `Unchanged`: there is nothing to have
    /// failed.
    #[must_use]
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a RewriteOutcome>) -> Self {
        let (mut mutated, mut untouched) = (0usize, 0usize);
        for outcome in outcomes {
            if outcome.is_mutation() {
                mutated += 1;
            } else {
                untouched += 1;
            }
        }
        match (mutated, untouched) {
            (0, _) => Self::Unchanged,
            (_, 0) => Self::Failure,
            _ => Self::PartialSuccess,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OverallStatus, RewriteOutcome};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_is_unchanged() {
        assert_eq!(OverallStatus::from_outcomes(&[]), OverallStatus::Unchanged);
    }

    #[test]
    fn all_untouched_is_unchanged() {
        let outcomes = [RewriteOutcome::Untouched, RewriteOutcome::Untouched];
        assert_eq!(OverallStatus::from_outcomes(&outcomes), OverallStatus::Unchanged);
    }

    #[test]
    fn mixed_is_partial_success() {
        let outcomes = [RewriteOutcome::Untouched, RewriteOutcome::Removed];
        assert_eq!(
            OverallStatus::from_outcomes(&outcomes),
            OverallStatus::PartialSuccess
        );
    }

    #[test]
    fn all_mutated_is_failure() {
        let outcomes = [
            RewriteOutcome::Removed,
            RewriteOutcome::ReplacedWithPlaceholder {
                mime_type: "text/plain".to_string(),
            },
        ];
        assert_eq!(OverallStatus::from_outcomes(&outcomes), OverallStatus::Failure);
    }
}
