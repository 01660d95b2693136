//! Namespace-agnostic reading and mutation of the ebXML
//! `RetrieveDocumentSetResponse` SOAP body.

use docscan_common::document::{DocumentRef, OverallStatus, RewriteOutcome};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;

const STATUS_PARTIAL_SUCCESS: &str = "urn:ihe:iti:2007:ResponseStatusType:PartialSuccess";
const STATUS_FAILURE: &str = "urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Failure";
const SEVERITY_ERROR: &str = "urn:oasis:names:tc:ebxml-regrep:ErrorSeverityType:Error";

fn local_name(name: quick_xml::name::QName<'_>) -> Vec<u8> {
    name.local_name().as_ref().to_vec()
}

/// True if the body contains a `RetrieveDocumentSetResponse` element,
/// regardless of namespace prefix.
#[must_use]
pub fn has_retrieve_document_set_response(xml: &[u8]) -> bool {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if local_name(e.name()) == b"RetrieveDocumentSetResponse" {
                    return true;
                }
            }
            Ok(Event::Eof) => return false,
            Err(_) => return false,
            _ => {}
        }
        buf.clear();
    }
}

/// Walk every `DocumentResponse` and build the Content-ID keyed index
/// the scan pass and removal rewrite both need.
#[must_use]
pub fn index_documents(xml: &[u8]) -> Vec<DocumentRef> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut documents = Vec::new();
    let mut in_document_response = false;
    let mut current_leaf: Option<Vec<u8>> = None;
    let mut document_unique_id: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut content_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = local_name(e.name());
                if name == b"DocumentResponse" {
                    in_document_response = true;
                    document_unique_id = None;
                    mime_type = None;
                    content_id = None;
                } else if in_document_response {
                    if name == b"Include" {
                        if let Some(href) = e
                            .attributes()
                            .flatten()
                            .find(|a| local_name(a.key) == b"href")
                        {
                            let raw = String::from_utf8_lossy(&href.value).to_string();
                            content_id = Some(docscan_mime::content_id_of(&raw));
                        }
                    }
                    current_leaf = Some(name);
                }
            }
            Ok(Event::Text(e)) if in_document_response => {
                if let Some(leaf) = &current_leaf {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match leaf.as_slice() {
                        b"DocumentUniqueId" => document_unique_id = Some(text),
                        b"mimeType" => mime_type = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name());
                if name == b"DocumentResponse" && in_document_response {
                    in_document_response = false;
                    if let Some(cid) = content_id.take() {
                        documents.push(DocumentRef {
                            document_unique_id: document_unique_id.take(),
                            mime_type: mime_type.take(),
                            content_id: cid,
                            outcome: RewriteOutcome::Untouched,
                        });
                    }
                }
                current_leaf = None;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    documents
}

/// Rewrite the SOAP body for remove-mode mutation: drop the
/// `DocumentResponse` entries for infected documents, append the
/// corresponding `RegistryError` entries, and set
/// `RegistryResponse/@status`.
#[must_use]
pub fn rewrite_for_removal(
    xml: &[u8],
    documents: &[DocumentRef],
    status: OverallStatus,
) -> Vec<u8> {
    let removed: HashMap<&str, Option<&str>> = documents
        .iter()
        .filter(|d| matches!(d.outcome, RewriteOutcome::Removed))
        .map(|d| (d.content_id.as_str(), d.document_unique_id.as_deref()))
        .collect();

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut writer = Writer::new(Vec::new());

    // Buffered subtree while we decide whether a DocumentResponse survives.
    let mut suppressing = false;
    let mut suppress_depth = 0_usize;
    let mut pending_content_id: Option<String> = None;
    let mut buffered: Vec<Event<'static>> = Vec::new();
    let mut seen_error_list = false;

    let mut errors: Vec<(String, String)> = Vec::new();
    for (content_id, uid) in &removed {
        errors.push((
            "XDSDocumentUniqueIdError".to_string(),
            format!(
                "Document was detected as malware for uniqueId '{}'.",
                uid.unwrap_or(content_id)
            ),
        ));
    }
    if matches!(status, OverallStatus::Failure) {
        errors.push((
            "XDSRegistryMetadataError".to_string(),
            "No documents found for unique ids in request".to_string(),
        ));
    }

    loop {
        let event = reader.read_event_into(&mut buf);
        match event {
            Ok(Event::Eof) => break,
            Err(_) => break,
            Ok(ev) => {
                let owned = ev.into_owned();
                handle_event(
                    owned,
                    &mut writer,
                    &mut suppressing,
                    &mut suppress_depth,
                    &mut pending_content_id,
                    &mut buffered,
                    &removed,
                    status,
                    &errors,
                    &mut seen_error_list,
                );
            }
        }
        buf.clear();
    }

    writer.into_inner()
}

#[allow(clippy::too_many_arguments)]
fn handle_event(
    event: Event<'static>,
    writer: &mut Writer<Vec<u8>>,
    suppressing: &mut bool,
    suppress_depth: &mut usize,
    pending_content_id: &mut Option<String>,
    buffered: &mut Vec<Event<'static>>,
    removed: &HashMap<&str, Option<&str>>,
    status: OverallStatus,
    errors: &[(String, String)],
    seen_error_list: &mut bool,
) {
    match &event {
        Event::Start(e) | Event::Empty(e) => {
            let name = local_name(e.name());

            if name == b"RegistryResponse" {
                if !matches!(status, OverallStatus::Unchanged) {
                    let mut start = e.clone();
                    set_status_attr(&mut start, status_urn(status));
                    let _ = writer.write_event(if matches!(event, Event::Empty(_)) {
                        Event::Empty(start)
                    } else {
                        Event::Start(start)
                    });
                    return;
                }
            }

            if name == b"RegistryErrorList" {
                *seen_error_list = true;
                if matches!(event, Event::Empty(_)) {
                    if errors.is_empty() {
                        let _ = writer.write_event(Event::Empty(e.clone()));
                    } else {
                        expand_empty_error_list(writer, e, errors);
                    }
                    return;
                }
            }

            if name == b"DocumentResponse" {
                *suppressing = false;
                *suppress_depth = 0;
                *pending_content_id = None;
                buffered.clear();
                buffered.push(event.clone());
                if matches!(event, Event::Empty(_)) {
                    flush_or_drop(writer, buffered, pending_content_id, removed);
                }
                if matches!(event, Event::Start(_)) {
                    *suppress_depth = 1;
                }
                return;
            }

            if *suppress_depth > 0 {
                if name == b"Include" {
                    if let Some(href) = e.attributes().flatten().find(|a| local_name(a.key) == b"href") {
                        let raw = String::from_utf8_lossy(&href.value).to_string();
                        *pending_content_id = Some(docscan_mime::content_id_of(&raw));
                    }
                }
                buffered.push(event.clone());
                if matches!(event, Event::Start(_)) {
                    *suppress_depth += 1;
                }
                return;
            }
        }
        Event::End(e) => {
            let name = local_name(e.name());

            if name == b"RegistryErrorList" && !errors.is_empty() {
                write_errors(writer, errors);
            }

            if name == b"RegistryResponse" && !*seen_error_list && !errors.is_empty() {
                inject_error_list(writer, errors);
                *seen_error_list = true;
            }

            if *suppress_depth > 0 {
                buffered.push(event.clone());
                *suppress_depth -= 1;
                if *suppress_depth == 0 {
                    flush_or_drop(writer, buffered, pending_content_id, removed);
                }
                return;
            }
        }
        Event::Text(_) if *suppress_depth > 0 => {
            buffered.push(event.clone());
            return;
        }
        _ => {}
    }

    if *suppress_depth == 0 {
        let _ = writer.write_event(event);
    }
}

fn flush_or_drop(
    writer: &mut Writer<Vec<u8>>,
    buffered: &mut Vec<Event<'static>>,
    pending_content_id: &mut Option<String>,
    removed: &HashMap<&str, Option<&str>>,
) {
    let drop_subtree = pending_content_id
        .as_deref()
        .is_some_and(|cid| removed.contains_key(cid));

    if !drop_subtree {
        for event in buffered.drain(..) {
            let _ = writer.write_event(event);
        }
    } else {
        buffered.clear();
    }
    *pending_content_id = None;
}

fn set_status_attr(start: &mut BytesStart<'_>, status: &str) {
    let mut attrs: Vec<(Vec<u8>, Vec<u8>)> = start
        .attributes()
        .flatten()
        .map(|a| (a.key.as_ref().to_vec(), a.value.to_vec()))
        .collect();

    let mut found = false;
    for (key, value) in &mut attrs {
        if local_name(quick_xml::name::QName(key)) == b"status" {
            *value = status.as_bytes().to_vec();
            found = true;
        }
    }
    if !found {
        attrs.push((b"status".to_vec(), status.as_bytes().to_vec()));
    }

    start.clear_attributes();
    for (key, value) in attrs {
        start.push_attribute((key.as_slice(), value.as_slice()));
    }
}

fn write_errors(writer: &mut Writer<Vec<u8>>, errors: &[(String, String)]) {
    for (code, context) in errors {
        let mut tag = BytesStart::new("RegistryError");
        tag.push_attribute(("errorCode", code.as_str()));
        tag.push_attribute(("severity", SEVERITY_ERROR));
        tag.push_attribute(("codeContext", context.as_str()));
        let _ = writer.write_event(Event::Empty(tag));
    }
}

/// Expand a self-closing `<RegistryErrorList/>` into a Start/End pair so
/// `RegistryError` children can be written inside it.
fn expand_empty_error_list(writer: &mut Writer<Vec<u8>>, e: &BytesStart<'_>, errors: &[(String, String)]) {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let _ = writer.write_event(Event::Start(e.clone()));
    write_errors(writer, errors);
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

/// Create a `RegistryErrorList` that the source document never had, the
/// way `av_gate.py` does when it needs to report an error but found no
/// existing element to hang it on.
fn inject_error_list(writer: &mut Writer<Vec<u8>>, errors: &[(String, String)]) {
    let _ = writer.write_event(Event::Start(BytesStart::new("RegistryErrorList")));
    write_errors(writer, errors);
    let _ = writer.write_event(Event::End(BytesEnd::new("RegistryErrorList")));
}

fn status_urn(status: OverallStatus) -> &'static str {
    match status {
        OverallStatus::PartialSuccess => STATUS_PARTIAL_SUCCESS,
        OverallStatus::Failure => STATUS_FAILURE,
        OverallStatus::Unchanged => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
<soap:Body>
<RetrieveDocumentSetResponse xmlns="urn:ihe:iti:xds-b:2007">
  <RegistryResponse xmlns="urn:oasis:names:tc:ebxml-regrep:xsd:rs:3.0" status="urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success">
    <RegistryErrorList/>
  </RegistryResponse>
  <DocumentResponse>
    <DocumentUniqueId>doc1</DocumentUniqueId>
    <mimeType>application/pdf</mimeType>
    <Document><xop:Include href="cid:doc1@k" xmlns:xop="http://www.w3.org/2004/08/xop/include"/></Document>
  </DocumentResponse>
  <DocumentResponse>
    <DocumentUniqueId>doc2</DocumentUniqueId>
    <mimeType>application/pdf</mimeType>
    <Document><xop:Include href="cid:doc2@k" xmlns:xop="http://www.w3.org/2004/08/xop/include"/></Document>
  </DocumentResponse>
</RetrieveDocumentSetResponse>
</soap:Body>
</soap:Envelope>"#;

    #[test]
    fn finds_retrieve_document_set_response() {
        assert!(has_retrieve_document_set_response(SAMPLE.as_bytes()));
        assert!(!has_retrieve_document_set_response(b"<a><b/></a>"));
    }

    #[test]
    fn indexes_documents_by_content_id() {
        let docs = index_documents(SAMPLE.as_bytes());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content_id, "doc1");
        assert_eq!(docs[0].mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(docs[1].content_id, "doc2");
    }

    #[test]
    fn removal_drops_document_and_sets_partial_success() {
        let mut docs = index_documents(SAMPLE.as_bytes());
        docs[0].outcome = RewriteOutcome::Removed;

        let rewritten = rewrite_for_removal(SAMPLE.as_bytes(), &docs, OverallStatus::PartialSuccess);
        let text = String::from_utf8(rewritten).unwrap();

        assert!(!text.contains("doc1@k"));
        assert!(text.contains("doc2@k"));
        assert!(text.contains("urn:ihe:iti:2007:ResponseStatusType:PartialSuccess"));
        assert!(text.contains("XDSDocumentUniqueIdError"));
    }

    #[test]
    fn removal_of_all_documents_is_failure() {
        let mut docs = index_documents(SAMPLE.as_bytes());
        docs[0].outcome = RewriteOutcome::Removed;
        docs[1].outcome = RewriteOutcome::Removed;

        let rewritten = rewrite_for_removal(SAMPLE.as_bytes(), &docs, OverallStatus::Failure);
        let text = String::from_utf8(rewritten).unwrap();

        assert!(text.contains("urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Failure"));
        assert!(text.contains("XDSRegistryMetadataError"));
    }

    const SAMPLE_NO_ERROR_LIST: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
<soap:Body>
<RetrieveDocumentSetResponse xmlns="urn:ihe:iti:xds-b:2007">
  <RegistryResponse xmlns="urn:oasis:names:tc:ebxml-regrep:xsd:rs:3.0" status="urn:oasis:names:tc:ebxml-regrep:ResponseStatusType:Success">
  </RegistryResponse>
  <DocumentResponse>
    <DocumentUniqueId>doc1</DocumentUniqueId>
    <mimeType>application/pdf</mimeType>
    <Document><xop:Include href="cid:doc1@k" xmlns:xop="http://www.w3.org/2004/08/xop/include"/></Document>
  </DocumentResponse>
</RetrieveDocumentSetResponse>
</soap:Body>
</soap:Envelope>"#;

    #[test]
    fn removal_creates_registry_error_list_when_absent() {
        let mut docs = index_documents(SAMPLE_NO_ERROR_LIST.as_bytes());
        docs[0].outcome = RewriteOutcome::Removed;

        let rewritten = rewrite_for_removal(SAMPLE_NO_ERROR_LIST.as_bytes(), &docs, OverallStatus::Failure);
        let text = String::from_utf8(rewritten).unwrap();

        assert!(!text.contains("doc1@k"));
        assert!(text.contains("<RegistryErrorList>"));
        assert!(text.contains("XDSDocumentUniqueIdError"));
        assert!(text.contains("XDSRegistryMetadataError"));
    }
}
