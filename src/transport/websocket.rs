//! WebSocket transport
//!
//! Every connection, accepted or dialled, is handled the same way:
//! - a `Peer` with a fresh id is registered in `WsTransport`
//! - a writer task drains the peer's channel into the socket
//! - the reader loop hands each text frame to `FloodRelay::on_peer_message`
//! - the stored undelivered backlog is queued for the new peer
//! - when either side stops, the peer is removed
//!
//! Peer ids are connection-scoped, which is enough for loop prevention: the
//! relay never sends a message back over the connection it came in on.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::spawn;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{WebSocketStream, accept_async, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::message::Message;
use crate::peer::Peer;
use crate::relay::FloodRelay;
use crate::transport::message::PeerFrame;
use crate::transport::{PeerId, PeerTransport};
use crate::utils::error::TransportError;

/// Registry of open WebSocket connections.
#[derive(Debug, Default)]
pub struct WsTransport {
    peers: Mutex<HashMap<PeerId, Peer>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, peer: Peer) {
        let mut peers = self.peers.lock().await;
        peers.insert(peer.id.clone(), peer);
    }

    pub async fn remove(&self, peer_id: &str) -> bool {
        self.peers.lock().await.remove(peer_id).is_some()
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// Queue a frame for one peer.
    pub async fn send_frame(&self, peer_id: &str, frame: &PeerFrame) -> Result<(), TransportError> {
        let ws = frame.to_ws()?;
        let peers = self.peers.lock().await;
        let peer = peers
            .get(peer_id)
            .ok_or_else(|| TransportError::PeerUnavailable(peer_id.to_string()))?;
        peer.send(ws)
    }
}

#[async_trait]
impl PeerTransport for WsTransport {
    async fn reachable_peers(&self) -> Vec<PeerId> {
        self.peers
            .lock()
            .await
            .values()
            .filter(|p| p.is_connected())
            .map(|p| p.id.clone())
            .collect()
    }

    async fn broadcast(&self, peer: &PeerId, message: &Message) -> Result<(), TransportError> {
        let frame = PeerFrame::Envelope {
            message: message.clone(),
        };
        self.send_frame(peer, &frame).await
    }
}

/// Accept peer connections on `addr` until the listener fails.
pub async fn start_peer_server(
    addr: &str,
    relay: Arc<FloodRelay>,
    transport: Arc<WsTransport>,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Peer server listening on ws://{}", addr);

    loop {
        let (stream, remote) = listener.accept().await?;
        let relay = relay.clone();
        let transport = transport.clone();

        spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => {
                    let peer_id = attach(ws, relay, transport).await;
                    info!("{} connected from {}", peer_id, remote);
                }
                Err(e) => warn!("WebSocket handshake error from {}: {}", remote, e),
            }
        });
    }
}

/// Dial a peer node and start relaying over the connection.
pub async fn connect_peer(
    url: &str,
    relay: Arc<FloodRelay>,
    transport: Arc<WsTransport>,
) -> Result<PeerId, TransportError> {
    let (ws, _) = connect_async(url).await?;
    let peer_id = attach(ws, relay, transport).await;
    info!("{} connected to {}", peer_id, url);
    Ok(peer_id)
}

/// Register the connection as a peer and spawn its reader and writer tasks.
async fn attach<S>(ws: WebSocketStream<S>, relay: Arc<FloodRelay>, transport: Arc<WsTransport>) -> PeerId
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_sender, mut ws_receiver) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let peer = Peer::new(tx);
    let peer_id = peer.id.clone();
    transport.register(peer).await;

    {
        let peer_id = peer_id.clone();
        spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = ws_sender.send(frame).await {
                    warn!("Failed to send frame to {}: {}", peer_id, e);
                    break;
                }
            }
            debug!("Send loop closed for {}", peer_id);
        });
    }

    {
        let peer_id = peer_id.clone();
        let relay = relay.clone();
        spawn(async move {
            while let Some(Ok(frame)) = ws_receiver.next().await {
                if frame.is_close() {
                    break;
                }
                if !frame.is_text() {
                    continue;
                }
                let Ok(text) = frame.to_text() else {
                    continue;
                };
                match relay.on_peer_message(text, &peer_id).await {
                    Ok(outcome) => debug!("{} -> {:?}", peer_id, outcome),
                    Err(e) => warn!("Frame from {} failed: {}", peer_id, e),
                }
            }

            transport.remove(&peer_id).await;
            info!("{} disconnected", peer_id);
        });
    }

    // the writer is already draining, so the backlog goes out right away
    if let Err(e) = relay.forward_backlog(&peer_id).await {
        warn!("Could not send backlog to {}: {}", peer_id, e);
    }

    peer_id
}
