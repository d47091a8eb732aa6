//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Pending, Transport, TransportError};

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    ///
    /// Bind to port `0` to let the OS pick one; [`local_addr`] reports it.
    ///
    /// [`local_addr`]: Self::local_addr
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingWebSocket;
    type Connection = WebSocketConnection;

    async fn accept(&mut self) -> Result<PendingWebSocket, TransportError> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        tracing::trace!(%peer, "tcp peer accepted");
        Ok(PendingWebSocket { stream, peer })
    }
}

/// A TCP stream that has not sent its HTTP upgrade request yet.
pub struct PendingWebSocket {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Pending for PendingWebSocket {
    type Connection = WebSocketConnection;

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    async fn upgrade(self, within: Duration) -> Result<WebSocketConnection, TransportError> {
        let peer = self.peer;
        let ws = match tokio::time::timeout(within, tokio_tungstenite::accept_async(self.stream)).await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::Upgrade {
                    peer,
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(TransportError::UpgradeTimedOut { peer, within }),
        };

        let id = ConnectionId::next();
        tracing::debug!(%id, %peer, "websocket upgraded");
        Ok(WebSocketConnection::new(id, peer, ws))
    }
}

/// A single WebSocket connection.
///
/// The socket is split into its sink and stream halves, each behind its
/// own lock, so a task blocked in [`recv`](Connection::recv) never holds
/// up a [`send`](Connection::send).
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    fn new(id: ConnectionId, peer: SocketAddr, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id,
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    /// The remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn write_error(&self, err: tungstenite::Error) -> TransportError {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed(self.id)
            }
            e => TransportError::Send {
                id: self.id,
                reason: e.to_string(),
            },
        }
    }
}

impl Connection for WebSocketConnection {
    /// UTF-8 payloads go out as text frames, anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| self.write_error(e))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::Receive {
                        id: self.id,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self.sink.lock().await.close().await {
            Ok(()) => Ok(()),
            Err(e) => match self.write_error(e) {
                TransportError::Closed(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
