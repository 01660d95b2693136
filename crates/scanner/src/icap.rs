//! ICAP RESPMOD client, minimal by design: a single chunked
//! request/response exchange per scan, no OPTIONS negotiation, no
//! request-header encapsulation.

use docscan_common::{ProxyError, ScanVerdict};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Responses are never trusted past this many bytes; a scanner that
/// doesn't terminate its chunked body promptly is treated as a protocol
/// violation rather than read indefinitely.
const MAX_RESPONSE: usize = 2048;

pub struct Icap {
    host: String,
    port: u16,
    service: String,
    tls: bool,
}

impl Icap {
    #[must_use]
    pub const fn new(host: String, port: u16, service: String, tls: bool) -> Self {
        Self {
            host,
            port,
            service,
            tls,
        }
    }

    async fn respmod(&self, body: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let request = build_request(&self.host, &self.service, body);

        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| ProxyError::Scan(format!("connect to {}:{}: {e}", self.host, self.port)))?;

        if self.tls {
            let connector = tls_connector();
            let server_name = tokio_rustls::rustls::ServerName::try_from(self.host.as_str())
                .map_err(|_| ProxyError::Scan(format!("invalid ICAP TLS server name: {}", self.host)))?;
            let stream = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| ProxyError::Scan(format!("ICAP TLS handshake: {e}")))?;
            exchange(stream, &request).await
        } else {
            exchange(tcp, &request).await
        }
    }
}

#[async_trait::async_trait]
impl super::Scanner for Icap {
    async fn scan(&self, bytes: &[u8]) -> Result<ScanVerdict, ProxyError> {
        let response = self.respmod(bytes).await?;
        interpret_response(&response)
    }

    async fn ping(&self) -> Result<(), ProxyError> {
        // The reference implementation's health probe sends a literal
        // "ping" payload through a full RESPMOD exchange rather than a
        // real ICAP OPTIONS ping; any interpretable response counts as
        // alive.
        self.respmod(b"ping\r\n").await?;
        Ok(())
    }
}

fn build_request(host: &str, service: &str, body: &[u8]) -> Vec<u8> {
    let mut request = format!(
        "RESPMOD icap://{host}/{service} ICAP/1.0\r\n\
         Host: {host}\r\n\
         Encapsulated: res-body=0\r\n\
         \r\n"
    )
    .into_bytes();

    request.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
    request.extend_from_slice(body);
    request.extend_from_slice(b"\r\n0\r\n\r\n");
    request
}

async fn exchange<S>(mut stream: S, request: &[u8]) -> Result<Vec<u8>, ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(request)
        .await
        .map_err(|e| ProxyError::Scan(format!("write RESPMOD request: {e}")))?;

    let mut response = Vec::new();
    let mut chunk = [0_u8; 512];
    loop {
        if response.len() >= MAX_RESPONSE {
            break;
        }
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| ProxyError::Scan(format!("read RESPMOD response: {e}")))?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..n]);
        if response.ends_with(b"0\r\n\r\n") {
            break;
        }
    }
    response.truncate(MAX_RESPONSE.min(response.len()));
    Ok(response)
}

fn interpret_response(response: &[u8]) -> Result<ScanVerdict, ProxyError> {
    let text = String::from_utf8_lossy(response);
    let mut lines = text.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| ProxyError::Scan("empty ICAP response".to_string()))?;

    if status_line.contains("204") {
        return Ok(ScanVerdict::Ok);
    }

    if !status_line.contains("200") {
        return Err(ProxyError::Scan(format!("unexpected ICAP status: {status_line}")));
    }

    let has_403 = text.contains("HTTP/1.0 403") || text.contains("HTTP/1.1 403");
    if !has_403 {
        return Ok(ScanVerdict::Ok);
    }

    let threat = text
        .lines()
        .find(|line| line.starts_with("X-Infection-Found"))
        .and_then(|line| {
            line.split(';')
                .find_map(|field| field.trim().strip_prefix("Threat="))
        })
        .map(|name| name.trim_end_matches(';').to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(ScanVerdict::Found(Some(threat)))
}

fn tls_connector() -> tokio_rustls::TlsConnector {
    let config = tokio_rustls::rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(std::sync::Arc::new(NoVerify))
        .with_no_client_auth();
    tokio_rustls::TlsConnector::from(std::sync::Arc::new(config))
}

/// ICAP scanners are reached over trusted internal networks; TLS is used
/// for transport privacy, not for authenticating the scanner's identity.
struct NoVerify;

impl tokio_rustls::rustls::client::ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &tokio_rustls::rustls::Certificate,
        _intermediates: &[tokio_rustls::rustls::Certificate],
        _server_name: &tokio_rustls::rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<tokio_rustls::rustls::client::ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(tokio_rustls::rustls::client::ServerCertVerified::assertion())
    }
}
