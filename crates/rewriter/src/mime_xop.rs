//! The MIME/XOP response rewriter: scans every attachment of a
//! `RetrieveDocumentSetResponse` and, if any is infected, splices a
//! rewritten envelope.

use docscan_common::document::{DocumentRef, OverallStatus, RewriteOutcome};
use docscan_common::ProxyError;
use docscan_mime::{content_type, multipart, splice::PartEdit};
use docscan_replacements::ReplacementStore;
use docscan_scanner::Scanner;
use std::collections::HashMap;

/// The literal EICAR test-file signature. Its presence in a body
/// governs both the self-test log (scanner missed a clean EICAR verdict)
/// and the post-rewrite safety check.
const EICAR_SIGNATURE: &[u8] =
    br"$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const PDF_MAGIC: &[u8] = b"%PDF";

/// Whether infected attachments are replaced in place or dropped
/// entirely, mirroring `GlobalPolicy::remove_malicious`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPolicy {
    Replace,
    Remove,
}

/// Scan-and-rewrite a `multipart/related` SOAP/XOP response body.
///
/// Returns `Ok(None)` when nothing needs rewriting (the `Content-Type`
/// isn't multipart, the body has no `RetrieveDocumentSetResponse`, or
/// every attachment scanned clean): the caller forwards the original
/// body untouched in that case.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(body, scanner, replacements), fields(body_len = body.len()))]
pub async fn rewrite_response(
    content_type_header: &str,
    body: &[u8],
    scanner: &dyn Scanner,
    replacements: &ReplacementStore,
    policy: MutationPolicy,
    all_png_malicious: bool,
    all_pdf_malicious: bool,
) -> Result<Option<Vec<u8>>, ProxyError> {
    if !content_type_header.trim_start().to_ascii_lowercase().starts_with("multipart") {
        return Ok(None);
    }

    let top_level = content_type::parse(content_type_header)
        .map_err(|e| ProxyError::Parse(e.to_string()))?;
    let envelope = multipart::parse(body, &top_level.boundary)
        .map_err(|e| ProxyError::Parse(e.to_string()))?;

    let Some(soap_part) = envelope.parts.first() else {
        tracing::debug!("multipart envelope has no parts, forwarding unchanged");
        return Ok(None);
    };
    let soap_xml = &body[soap_part.body.clone()];

    if !crate::soap::has_retrieve_document_set_response(soap_xml) {
        tracing::debug!("no RetrieveDocumentSetResponse in body, forwarding unchanged");
        return Ok(None);
    }

    let mut documents = crate::soap::index_documents(soap_xml);
    let by_content_id: HashMap<String, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.content_id.clone(), i))
        .collect();

    for part in &envelope.parts[1..] {
        let Some(content_id) = part.content_id() else {
            continue;
        };
        let Some(&doc_idx) = by_content_id.get(&content_id) else {
            continue;
        };

        let attachment = &body[part.body.clone()];
        let mut verdict = scanner.scan(attachment).await?;

        if all_png_malicious && attachment.starts_with(PNG_MAGIC) {
            verdict = docscan_common::ScanVerdict::Found(Some("test-override-png".to_string()));
        }
        if all_pdf_malicious && attachment.starts_with(PDF_MAGIC) {
            verdict = docscan_common::ScanVerdict::Found(Some("test-override-pdf".to_string()));
        }

        if !verdict.is_infected() && contains_eicar(attachment) {
            tracing::error!(content_id = %content_id, "scanner missed EICAR test signature");
        }

        if verdict.is_infected() {
            documents[doc_idx].outcome = match policy {
                MutationPolicy::Replace => RewriteOutcome::ReplacedWithPlaceholder {
                    mime_type: documents[doc_idx]
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| "text/plain".to_string()),
                },
                MutationPolicy::Remove => RewriteOutcome::Removed,
            };
        }
    }

    let infected = documents.iter().any(|d| d.outcome.is_mutation());
    if !infected {
        return Ok(None);
    }

    let status = OverallStatus::from_outcomes(documents.iter().map(|d| &d.outcome));
    let rewritten = splice_envelope(
        body,
        &envelope,
        &top_level.boundary,
        &documents,
        &by_content_id,
        soap_xml,
        status,
        replacements,
        policy,
    )?;

    if contains_eicar(&rewritten) {
        return Err(ProxyError::PolicyViolation);
    }

    Ok(Some(rewritten))
}

#[allow(clippy::too_many_arguments)]
fn splice_envelope(
    body: &[u8],
    envelope: &multipart::Envelope,
    boundary: &str,
    documents: &[DocumentRef],
    by_content_id: &HashMap<String, usize>,
    soap_xml: &[u8],
    status: OverallStatus,
    replacements: &ReplacementStore,
    policy: MutationPolicy,
) -> Result<Vec<u8>, ProxyError> {
    let mut edits = Vec::with_capacity(envelope.parts.len());

    for (idx, part) in envelope.parts.iter().enumerate() {
        if idx == 0 {
            edits.push(match policy {
                MutationPolicy::Remove => {
                    let rewritten_soap = crate::soap::rewrite_for_removal(soap_xml, documents, status);
                    let headers =
                        docscan_mime::remove_header_line(&body[part.header_block.clone()], "MIME-Version");
                    PartEdit::ReplaceHeadersAndBody(headers, rewritten_soap)
                }
                MutationPolicy::Replace => PartEdit::Keep,
            });
            continue;
        }

        let Some(doc_idx) = part
            .content_id()
            .and_then(|cid| by_content_id.get(&cid).copied())
        else {
            edits.push(PartEdit::Keep);
            continue;
        };

        edits.push(match &documents[doc_idx].outcome {
            RewriteOutcome::Untouched => PartEdit::Keep,
            RewriteOutcome::Removed => PartEdit::Remove,
            RewriteOutcome::ReplacedWithPlaceholder { mime_type } => {
                let replacement = replacements.get(mime_type).ok_or_else(|| {
                    ProxyError::Config(format!("no replacement available for {mime_type}"))
                })?;
                PartEdit::Replace(replacement.bytes.clone())
            }
        });
    }

    Ok(docscan_mime::splice::rebuild(body, envelope, boundary, &edits))
}

fn contains_eicar(bytes: &[u8]) -> bool {
    memchr::memmem::find(bytes, EICAR_SIGNATURE).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_common::{ProxyError as Err, ScanVerdict};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubScanner {
        verdicts: Vec<ScanVerdict>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Scanner for StubScanner {
        async fn scan(&self, _bytes: &[u8]) -> Result<ScanVerdict, Err> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdicts.get(i).cloned().unwrap_or(ScanVerdict::Ok))
        }
        async fn ping(&self) -> Result<(), Err> {
            Ok(())
        }
    }

    fn sample_body() -> Vec<u8> {
        [
            "--MIME_boundary\r\n",
            "Content-Type: application/xop+xml\r\n",
            "Content-ID: <root.message@k>\r\n",
            "\r\n",
            r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body>
<RetrieveDocumentSetResponse xmlns="urn:ihe:iti:xds-b:2007">
<RegistryResponse xmlns="urn:oasis:names:tc:ebxml-regrep:xsd:rs:3.0" status="urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success"><RegistryErrorList/></RegistryResponse>
<DocumentResponse><DocumentUniqueId>doc1</DocumentUniqueId><mimeType>application/pdf</mimeType>
<Document><xop:Include href="cid:doc1@k" xmlns:xop="http://www.w3.org/2004/08/xop/include"/></Document></DocumentResponse>
</RetrieveDocumentSetResponse></soap:Body></soap:Envelope>"#,
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

    fn store() -> ReplacementStore {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("text_plain.txt"), b"removed").unwrap();
        std::fs::write(dir.path().join("application_pdf.pdf"), b"%PDF-1.4 placeholder").unwrap();
        ReplacementStore::load(dir.path()).unwrap()
    }

    const CONTENT_TYPE: &str =
        r#"multipart/related; type="application/xop+xml"; start="<root.message@k>"; boundary="MIME_boundary""#;

    #[tokio::test]
    async fn clean_scan_is_a_no_op() {
        let scanner = StubScanner { verdicts: vec![ScanVerdict::Ok], calls: AtomicUsize::new(0) };
        let body = sample_body();
        let out = rewrite_response(
            CONTENT_TYPE,
            &body,
            &scanner,
            &store(),
            MutationPolicy::Replace,
            false,
            false,
        )
        .await
        .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn infected_attachment_is_replaced_in_place() {
        let scanner = StubScanner {
            verdicts: vec![ScanVerdict::Found(Some("eicar".to_string()))],
            calls: AtomicUsize::new(0),
        };
        let body = sample_body();
        let out = rewrite_response(
            CONTENT_TYPE,
            &body,
            &scanner,
            &store(),
            MutationPolicy::Replace,
            false,
            false,
        )
        .await
        .unwrap()
        .unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("Content-ID: <doc1@k>"));
        assert!(text.contains("placeholder"));
        assert!(!text.contains("%PDF-1.4 bytes"));
    }

    #[tokio::test]
    async fn infected_attachment_is_removed_and_soap_updated() {
        let scanner = StubScanner {
            verdicts: vec![ScanVerdict::Found(Some("eicar".to_string()))],
            calls: AtomicUsize::new(0),
        };
        let body = sample_body();
        let out = rewrite_response(
            CONTENT_TYPE,
            &body,
            &scanner,
            &store(),
            MutationPolicy::Remove,
            false,
            false,
        )
        .await
        .unwrap()
        .unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(!text.contains("doc1@k"));
        assert!(text.contains("XDSDocumentUniqueIdError"));
        assert!(text.contains("urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Failure"));
        assert!(text.contains("XDSRegistryMetadataError"));
    }

    #[tokio::test]
    async fn non_multipart_content_type_is_a_no_op() {
        let scanner = StubScanner { verdicts: vec![], calls: AtomicUsize::new(0) };
        let out = rewrite_response(
            "text/xml",
            b"<a/>",
            &scanner,
            &store(),
            MutationPolicy::Replace,
            false,
            false,
        )
        .await
        .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn png_test_override_forces_infection() {
        let mut png_body = PNG_MAGIC.to_vec();
        png_body.extend_from_slice(b"rest of png");
        let body = [
            "--MIME_boundary\r\n",
            "Content-Type: application/xop+xml\r\n",
            "Content-ID: <root.message@k>\r\n",
            "\r\n",
            r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body>
<RetrieveDocumentSetResponse xmlns="urn:ihe:iti:xds-b:2007">
<RegistryResponse xmlns="urn:oasis:names:tc:ebxml-regrep:xsd:rs:3.0" status="urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success"><RegistryErrorList/></RegistryResponse>
<DocumentResponse><DocumentUniqueId>doc1</DocumentUniqueId><mimeType>image/png</mimeType>
<Document><xop:Include href="cid:doc1@k" xmlns:xop="http://www.w3.org/2004/08/xop/include"/></Document></DocumentResponse>
</RetrieveDocumentSetResponse></soap:Body></soap:Envelope>"#,
            "\r\n",
            "--MIME_boundary\r\n",
            "Content-Type: image/png\r\n",
            "Content-ID: <doc1@k>\r\n",
            "\r\n",
        ]
        .concat()
        .into_bytes();
        let mut full = body;
        full.extend_from_slice(&png_body);
        full.extend_from_slice(b"\r\n--MIME_boundary--\r\n");

        let scanner = StubScanner { verdicts: vec![ScanVerdict::Ok], calls: AtomicUsize::new(0) };
        let out = rewrite_response(
            CONTENT_TYPE,
            &full,
            &scanner,
            &store(),
            MutationPolicy::Replace,
            true,
            false,
        )
        .await
        .unwrap();
        assert!(out.is_some());
    }
}
