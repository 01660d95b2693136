//! `clamd` INSTREAM protocol over a Unix domain socket.
//!
//! One connection per scan: send `zINSTREAM\0`, then the payload as a
//! sequence of big-endian-length-prefixed chunks terminated by a
//! zero-length chunk, then read the textual reply.

use docscan_common::{ProxyError, ScanVerdict};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

const INSTREAM_CMD: &[u8] = b"zINSTREAM\0";
const PING_CMD: &[u8] = b"zPING\0";
const PING_ANSWER: &[u8] = b"PONG";
const FOOTER: [u8; 4] = [0; 4];

/// Largest chunk sent per INSTREAM frame; bounded by the protocol's
/// 32-bit length prefix.
const MAX_CHUNK: usize = u32::MAX as usize;

pub struct ClamAv {
    socket: std::path::PathBuf,
}

impl ClamAv {
    #[must_use]
    pub const fn new(socket: std::path::PathBuf) -> Self {
        Self { socket }
    }

    async fn connect(&self) -> Result<UnixStream, ProxyError> {
        UnixStream::connect(&self.socket)
            .await
            .map_err(|e| ProxyError::Scan(format!("connect to {}: {e}", self.socket.display())))
    }
}

#[async_trait::async_trait]
impl super::Scanner for ClamAv {
    async fn scan(&self, bytes: &[u8]) -> Result<ScanVerdict, ProxyError> {
        let mut stream = self.connect().await?;
        stream
            .write_all(INSTREAM_CMD)
            .await
            .map_err(|e| ProxyError::Scan(format!("write INSTREAM: {e}")))?;

        for chunk in bytes.chunks(MAX_CHUNK) {
            #[allow(clippy::cast_possible_truncation)]
            let len = (chunk.len() as u32).to_be_bytes();
            stream
                .write_all(&len)
                .await
                .map_err(|e| ProxyError::Scan(format!("write chunk length: {e}")))?;
            stream
                .write_all(chunk)
                .await
                .map_err(|e| ProxyError::Scan(format!("write chunk: {e}")))?;
        }
        stream
            .write_all(&FOOTER)
            .await
            .map_err(|e| ProxyError::Scan(format!("write footer: {e}")))?;

        let reply = read_until_nul(&mut stream).await?;
        parse_reply(&reply)
    }

    async fn ping(&self) -> Result<(), ProxyError> {
        let mut stream = self.connect().await?;
        stream
            .write_all(PING_CMD)
            .await
            .map_err(|e| ProxyError::Scan(format!("write PING: {e}")))?;
        let reply = read_until_nul(&mut stream).await?;
        if memchr::memmem::find(&reply, PING_ANSWER).is_some() {
            Ok(())
        } else {
            Err(ProxyError::Scan("clamd did not answer PONG".to_string()))
        }
    }
}

async fn read_until_nul(stream: &mut UnixStream) -> Result<Vec<u8>, ProxyError> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 64];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| ProxyError::Scan(format!("read reply: {e}")))?;
        if n == 0 {
            return Err(ProxyError::Scan("clamd closed connection mid-reply".to_string()));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.contains(&0) {
            break;
        }
    }
    Ok(buf)
}

/// `stream: OK\0` or `stream: <signature> FOUND\0`.
fn parse_reply(reply: &[u8]) -> Result<ScanVerdict, ProxyError> {
    let text = String::from_utf8_lossy(reply);
    let text = text.trim_end_matches('\0').trim();

    if let Some(body) = text.strip_prefix("stream:") {
        let body = body.trim();
        if let Some(signature) = body.strip_suffix("FOUND") {
            let signature = signature.trim();
            return Ok(ScanVerdict::Found(if signature.is_empty() {
                None
            } else {
                Some(signature.to_string())
            }));
        }
        if body == "OK" {
            return Ok(ScanVerdict::Ok);
        }
    }
    Err(ProxyError::Scan(format!("unrecognized clamd reply: {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::parse_reply;
    use docscan_common::ScanVerdict;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_reply() {
        assert_eq!(parse_reply(b"stream: OK\0").unwrap(), ScanVerdict::Ok);
    }

    #[test]
    fn infected_reply_captures_signature() {
        assert_eq!(
            parse_reply(b"stream: Eicar-Test-Signature FOUND\0").unwrap(),
            ScanVerdict::Found(Some("Eicar-Test-Signature".to_string()))
        );
    }

    #[test]
    fn unrecognized_reply_is_scan_error() {
        assert!(parse_reply(b"garbage\0").is_err());
    }
}
