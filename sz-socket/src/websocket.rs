//! WebSocket transport backed by tokio-tungstenite.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use sz_core::error::{SzError, SzResult};

use crate::events::{CloseInfo, Frame};
use crate::transport::{ConnectRequest, Transport, TransportEvents, TransportFactory};

/// Close code reported when the server sends a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Default factory: real ws/wss connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl TransportFactory for WebSocketFactory {
    fn open(
        &self,
        request: ConnectRequest<'_>,
        events: TransportEvents,
    ) -> SzResult<Box<dyn Transport>> {
        let ws_request = build_request(request)?;
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        debug!(
            "opening websocket to {} (generation {})",
            request.endpoint,
            events.generation()
        );
        let task = tokio::spawn(run_connection(ws_request, out_rx, events));
        Ok(Box::new(WebSocketTransport { out_tx, task }))
    }
}

fn build_request(request: ConnectRequest<'_>) -> SzResult<Request> {
    let mut ws_request = request
        .endpoint
        .as_str()
        .into_client_request()
        .map_err(|e| SzError::InvalidEndpoint(e.to_string()))?;

    if !request.protocols.is_empty() {
        let value = HeaderValue::from_str(&request.protocols.join(", "))
            .map_err(|e| SzError::Config(format!("invalid sub-protocol list: {e}")))?;
        ws_request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }
    Ok(ws_request)
}

enum Outgoing {
    Frame(Frame),
    Close(CloseInfo),
}

struct WebSocketTransport {
    out_tx: mpsc::UnboundedSender<Outgoing>,
    task: JoinHandle<()>,
}

impl Transport for WebSocketTransport {
    fn send(&mut self, frame: Frame) -> SzResult<()> {
        self.out_tx
            .send(Outgoing::Frame(frame))
            .map_err(|_| SzError::Transport("connection task has stopped".into()))
    }

    fn close(&mut self, info: CloseInfo) {
        if self.out_tx.send(Outgoing::Close(info)).is_err() {
            self.task.abort();
        }
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
    }
}

async fn run_connection(
    request: Request,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: TransportEvents,
) {
    // Nothing but a close can be queued before open, so any outgoing item
    // (or the handle being dropped) cancels the attempt.
    let stream = tokio::select! {
        result = connect_async(request) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                events.error(format!("connect failed: {e}"));
                return;
            }
        },
        _ = outgoing.recv() => {
            debug!("connect cancelled (generation {})", events.generation());
            return;
        }
    };

    events.opened();
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            out = outgoing.recv() => match out {
                Some(Outgoing::Frame(frame)) => {
                    if let Err(e) = write.send(to_message(frame)).await {
                        events.error(format!("write failed: {e}"));
                        break;
                    }
                }
                Some(Outgoing::Close(info)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(info.code),
                        reason: info.reason.into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        debug!("close frame not delivered: {e}");
                    }
                    break;
                }
                None => {
                    let _ = write.close().await;
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    events.message(Frame::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    events.message(Frame::Binary(data.to_vec()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(f) => CloseInfo::new(u16::from(f.code), f.reason.as_str()),
                        None => CloseInfo::new(NO_STATUS_RECEIVED, ""),
                    };
                    debug!("server closed connection: {info}");
                    // Deliver the queued close reply before dropping the stream.
                    if let Err(e) = write.flush().await {
                        debug!("close reply not delivered: {e}");
                    }
                    events.closed(info);
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    debug!("received ping ({} bytes)", data.len());
                }
                Some(Ok(Message::Pong(data))) => {
                    debug!("received pong ({} bytes)", data.len());
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!("websocket read error: {e}");
                    events.error(e.to_string());
                    break;
                }
                None => {
                    events.closed(CloseInfo::abnormal("stream ended"));
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_build_request_sets_protocols() {
        let url = Url::parse("ws://localhost:5000/ws").unwrap();
        let protocols = vec!["stratizens.v1".to_string(), "json".to_string()];
        let request = build_request(ConnectRequest {
            endpoint: &url,
            protocols: &protocols,
        })
        .unwrap();
        assert_eq!(
            request.headers().get(SEC_WEBSOCKET_PROTOCOL).unwrap(),
            "stratizens.v1, json"
        );
    }

    #[test]
    fn test_build_request_without_protocols() {
        let url = Url::parse("wss://hub.example.edu/ws").unwrap();
        let request = build_request(ConnectRequest {
            endpoint: &url,
            protocols: &[],
        })
        .unwrap();
        assert!(request.headers().get(SEC_WEBSOCKET_PROTOCOL).is_none());
    }

    #[test]
    fn test_build_request_rejects_bad_protocol() {
        let url = Url::parse("ws://localhost/ws").unwrap();
        let protocols = vec!["bad\nvalue".to_string()];
        let err = build_request(ConnectRequest {
            endpoint: &url,
            protocols: &protocols,
        })
        .unwrap_err();
        assert!(matches!(err, SzError::Config(_)));
    }
}
