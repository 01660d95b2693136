//! Rewrites `connector.sds` endpoint locations so clients are pointed
//! back at this proxy instead of the real Konnektor.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

fn local_name(name: quick_xml::name::QName<'_>) -> Vec<u8> {
    name.local_name().as_ref().to_vec()
}

fn attr(start: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| local_name(a.key) == local)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

/// Rewrite every `EndpointTLS/@Location` under a `PHRService` (or, when
/// `proxy_all_services` is set, under any service) so it points at
/// `inbound_host` instead of the Konnektor.
#[must_use]
pub fn rewrite_endpoints(xml: &[u8], inbound_host: &str, proxy_all_services: bool) -> Vec<u8> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut writer = Writer::new(Vec::new());

    let mut service_depth = 0_usize;
    let mut service_is_target = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Err(_) => break,
            Ok(event) => {
                let owned = event.into_owned();
                match &owned {
                    Event::Start(e) | Event::Empty(e) => {
                        let name = local_name(e.name());
                        if name == b"Service" {
                            service_depth += 1;
                            service_is_target =
                                proxy_all_services || attr(e, b"Name").as_deref() == Some("PHRService");
                        }

                        if name == b"EndpointTLS" && service_is_target {
                            if let Some(location) = attr(e, b"Location") {
                                if let Some(rewritten) = rewrite_location(&location, inbound_host) {
                                    let mut start = e.clone();
                                    set_location_attr(&mut start, &rewritten);
                                    let _ = writer.write_event(if matches!(owned, Event::Empty(_)) {
                                        Event::Empty(start)
                                    } else {
                                        Event::Start(start)
                                    });
                                    buf.clear();
                                    continue;
                                }
                            }
                        }

                        let _ = writer.write_event(owned.clone());
                    }
                    Event::End(e) => {
                        if local_name(e.name()) == b"Service" {
                            service_depth = service_depth.saturating_sub(1);
                            if service_depth == 0 {
                                service_is_target = false;
                            }
                        }
                        let _ = writer.write_event(owned.clone());
                    }
                    _ => {
                        let _ = writer.write_event(owned.clone());
                    }
                }
            }
        }
        buf.clear();
    }

    writer.into_inner()
}

/// `<scheme>://<inbound-Host><path>` from the original Location's path,
/// keeping the original scheme. Returns `None` if `location` has no path
/// component to preserve.
fn rewrite_location(location: &str, inbound_host: &str) -> Option<String> {
    let scheme_end = location.find("://")?;
    let scheme = &location[..scheme_end];
    let after_scheme = &location[scheme_end + 3..];
    let path_start = after_scheme.find('/').unwrap_or(after_scheme.len());
    let path = &after_scheme[path_start..];
    Some(format!("{scheme}://{inbound_host}{path}"))
}

fn set_location_attr(start: &mut BytesStart<'_>, location: &str) {
    let mut attrs: Vec<(Vec<u8>, Vec<u8>)> = start
        .attributes()
        .flatten()
        .map(|a| (a.key.as_ref().to_vec(), a.value.to_vec()))
        .collect();

    for (key, value) in &mut attrs {
        if local_name(quick_xml::name::QName(key)) == b"Location" {
            *value = location.as_bytes().to_vec();
        }
    }

    start.clear_attributes();
    for (key, value) in attrs {
        start.push_attribute((key.as_slice(), value.as_slice()));
    }
}
