use crate::error::{CloseError, ConnectError, RequestError};
use crate::types::WsErrorKind;
use futures_util::SinkExt;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError, Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderName, HeaderValue, header::ORIGIN},
    },
};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsConnection {
    stream: WsStream,
    pub connect_time_us: u64,
}

impl WsConnection {
    pub fn new(stream: WsStream, connect_time_us: u64) -> Self {
        Self {
            stream,
            connect_time_us,
        }
    }

    pub async fn send(&mut self, message: &str) -> Result<(), RequestError> {
        self.stream
            .send(Message::text(message))
            .await
            .map_err(|e| RequestError::Send {
                kind: send_error_to_kind(&e),
                message: e.to_string(),
            })
    }

    pub async fn close(mut self) -> Result<(), CloseError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| CloseError::Close {
                kind: ws_error_to_kind(&e),
                message: e.to_string(),
            })
    }
}

/// Establish a new WebSocket connection, sending `origin` and any extra
/// headers with the upgrade request.
pub async fn connect(
    url: &str,
    origin: Option<&str>,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<WsConnection, ConnectError> {
    let request = build_request(url, origin, headers)?;
    let start = Instant::now();

    let result = tokio::time::timeout(timeout, connect_async(request)).await;

    match result {
        Ok(Ok((stream, _response))) => {
            let connect_time_us = start.elapsed().as_micros() as u64;
            Ok(WsConnection::new(stream, connect_time_us))
        }
        Ok(Err(e)) => Err(ConnectError::Dial {
            kind: ws_error_to_kind(&e),
            message: e.to_string(),
        }),
        Err(_) => Err(ConnectError::Timeout(timeout)),
    }
}

fn build_request(
    url: &str,
    origin: Option<&str>,
    headers: &[(String, String)],
) -> Result<Request, ConnectError> {
    let invalid = |reason: String| ConnectError::InvalidTarget {
        url: url.to_string(),
        reason,
    };

    let mut request = url.into_client_request().map_err(|e| invalid(e.to_string()))?;

    if let Some(origin) = origin.filter(|o| !o.is_empty()) {
        let value = HeaderValue::from_str(origin)
            .map_err(|e| invalid(format!("bad origin '{}': {}", origin, e)))?;
        request.headers_mut().insert(ORIGIN, value);
    }

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| invalid(format!("bad header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| invalid(format!("bad header value for '{}': {}", name, e)))?;
        request.headers_mut().insert(name, value);
    }

    Ok(request)
}

fn send_error_to_kind(err: &WsError) -> WsErrorKind {
    match err {
        WsError::Io(_) => WsErrorKind::SendFailed,
        other => ws_error_to_kind(other),
    }
}

fn ws_error_to_kind(err: &WsError) -> WsErrorKind {
    match err {
        WsError::ConnectionClosed => WsErrorKind::ConnectionClosed,
        WsError::AlreadyClosed => WsErrorKind::ConnectionClosed,
        WsError::Io(io_err) => {
            let msg = io_err.to_string().to_lowercase();
            if msg.contains("tls") || msg.contains("certificate") {
                WsErrorKind::Tls
            } else {
                WsErrorKind::ConnectFailed
            }
        }
        WsError::Tls(_) => WsErrorKind::Tls,
        WsError::Protocol(_) => WsErrorKind::ProtocolError,
        WsError::Http(_) | WsError::HttpFormat(_) => WsErrorKind::HandshakeFailed,
        WsError::Url(_) => WsErrorKind::ConnectFailed,
        _ => WsErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_origin_and_headers() {
        let headers = vec![("X-Test".to_string(), "yes".to_string())];
        let request =
            build_request("ws://127.0.0.1:9/socket", Some("http://example.com"), &headers).unwrap();

        assert_eq!(request.headers()[ORIGIN], "http://example.com");
        assert_eq!(request.headers()["x-test"], "yes");
    }

    #[test]
    fn empty_origin_is_not_sent() {
        let request = build_request("ws://127.0.0.1:9/", Some(""), &[]).unwrap();
        assert!(request.headers().get(ORIGIN).is_none());
    }

    #[test]
    fn malformed_url_is_invalid_target() {
        let err = build_request("not a url", None, &[]).unwrap_err();
        assert!(matches!(err, ConnectError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_classified() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("ws://{}/", addr);
        let err = connect(&url, None, &[], Duration::from_secs(2))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), WsErrorKind::ConnectFailed);
    }
}
