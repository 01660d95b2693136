//! Forwards inbound requests to the resolved upstream Konnektor,
//! carrying per-profile mTLS identity and TLS verification policy.

use docscan_common::{ProxyError, UpstreamProfile};
use reqwest::header::{HeaderMap, HeaderName, HOST};

use crate::router::REAL_IP_HEADER;

/// Wraps a single shared [`reqwest::Client`], reused across requests for
/// connection pooling. Per-profile mTLS identities are loaded fresh for
/// each call rather than cached: profiles are few and static, so the
/// extra file read per request is not worth the bookkeeping.
#[derive(Clone)]
pub struct Requester {
    default_client: reqwest::Client,
}

impl Requester {
    /// Build the shared client used for profiles that need neither a
    /// custom identity nor relaxed certificate verification.
    pub fn new() -> Result<Self, ProxyError> {
        let default_client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;
        Ok(Self { default_client })
    }

    /// Forward `method path_and_query` with `headers`/`body` to
    /// `profile.konnektor`, returning the upstream's response
    /// unconsumed so the caller decides whether to buffer or stream it.
    pub async fn forward(
        &self,
        profile: &UpstreamProfile,
        method: reqwest::Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = format!("{}{}", profile.konnektor.trim_end_matches('/'), path_and_query);

        let client = self.client_for(profile)?;
        let forwarded_headers = strip_hop_headers(headers);

        let response = client
            .request(method, &url)
            .headers(forwarded_headers)
            .body(body)
            .send()
            .await
            .map_err(|e| ProxyError::Upstream(e.to_string()))?;

        Ok(response)
    }

    fn client_for(&self, profile: &UpstreamProfile) -> Result<reqwest::Client, ProxyError> {
        if profile.ssl_verify && profile.client_identity().is_none() {
            return Ok(self.default_client.clone());
        }

        let mut builder = reqwest::Client::builder().danger_accept_invalid_certs(!profile.ssl_verify);

        if let Some((cert_path, key_path)) = profile.client_identity() {
            let mut pem = std::fs::read(cert_path)
                .map_err(|e| ProxyError::Upstream(format!("read client cert: {e}")))?;
            let mut key = std::fs::read(key_path)
                .map_err(|e| ProxyError::Upstream(format!("read client key: {e}")))?;
            pem.append(&mut key);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| ProxyError::Upstream(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| ProxyError::Upstream(e.to_string()))
    }
}

/// Strip `Host` and the real-IP header before forwarding; everything
/// else passes through unchanged.
fn strip_hop_headers(headers: &HeaderMap) -> HeaderMap {
    let real_ip: HeaderName = REAL_IP_HEADER.parse().expect("static header name is valid");
    headers
        .iter()
        .filter(|(name, _)| **name != HOST && **name != real_ip)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Logs a warning if the upstream base URL leaks verbatim into a
/// buffered response body — a sign the Konnektor is telling clients its
/// real address instead of the proxy's.
pub fn warn_if_base_url_leaked(profile: &UpstreamProfile, body: &[u8]) {
    if memchr::memmem::find(body, profile.konnektor.as_bytes()).is_some() {
        tracing::warn!(konnektor = %profile.konnektor, "upstream base URL appears verbatim in response body");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strip_hop_headers_drops_host_and_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "proxy.local".parse().unwrap());
        headers.insert(REAL_IP_HEADER, "10.0.0.1".parse().unwrap());
        headers.insert("accept", "application/soap+xml".parse().unwrap());

        let stripped = strip_hop_headers(&headers);
        assert!(stripped.get(HOST).is_none());
        assert!(stripped.get(REAL_IP_HEADER).is_none());
        assert_eq!(stripped.get("accept").unwrap(), "application/soap+xml");
    }
}
