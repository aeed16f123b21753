//! UDP adapters: listener (`udpin`) and fixed-remote sender (`udpout`).
//!
//! The listener creates one routable connection per observed peer; the
//! listener socket itself is never a routable connection, so frames can
//! never echo back out of the socket they arrived on. One datagram is
//! assumed to carry exactly one frame.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use mavswitch_codec::Message;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionKey, EndpointKind, LinkEvent, OUTBOUND_QUEUE};
use crate::error::NetworkError;
use crate::framing::decode_datagram;

/// Bind a UDP listener and spawn its receive task. Each new peer address
/// registers its own connection with the router.
pub async fn spawn_udp_in<M: Message>(
    bind: SocketAddr,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) -> Result<(), NetworkError> {
    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| NetworkError::Bind {
            addr: bind,
            source: e,
        })?;
    let local = socket.local_addr().unwrap_or(bind);
    info!(%local, "udp listener bound");

    tokio::spawn(run_udp_in(Arc::new(socket), local, events, cancel));
    Ok(())
}

async fn run_udp_in<M: Message>(
    socket: Arc<UdpSocket>,
    local: SocketAddr,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) {
    let mut peers: HashSet<SocketAddr> = HashSet::new();
    let mut buf = vec![0u8; 65536];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            received = socket.recv_from(&mut buf) => {
                let (n, peer) = match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "udp recv failed");
                        continue;
                    }
                };
                let key = ConnectionKey::from(format!("udpin:{local}/peer:{peer}"));

                if peers.insert(peer) {
                    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
                    tokio::spawn(peer_writer(Arc::clone(&socket), peer, rx));
                    let conn = Connection::new(key.clone(), EndpointKind::UdpPeer, tx);
                    if events.send(LinkEvent::Connected(conn)).await.is_err() {
                        break;
                    }
                    info!(%peer, "new udp peer");
                }

                match decode_datagram::<M>(&key, &buf[..n]) {
                    Ok(frame) => {
                        if events.send(LinkEvent::Frame { key, frame }).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        debug!(%peer, %error, "dropping udp datagram");
                        if events.send(LinkEvent::FrameError { key, error }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn peer_writer(socket: Arc<UdpSocket>, peer: SocketAddr, mut rx: mpsc::Receiver<Bytes>) {
    while let Some(raw) = rx.recv().await {
        if let Err(e) = socket.send_to(&raw, peer).await {
            warn!(%peer, error = %e, "udp send failed");
        }
    }
}

/// Open a UDP socket aimed at a fixed remote and register it as a single
/// connection. The socket also receives: replies from the remote are decoded
/// and fed to the router.
pub async fn spawn_udp_out<M: Message>(
    remote: SocketAddr,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) -> Result<(), NetworkError> {
    let bind = unspecified_for(remote);
    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| NetworkError::Bind {
            addr: bind,
            source: e,
        })?;
    socket
        .connect(remote)
        .await
        .map_err(|e| NetworkError::Connect {
            addr: remote,
            source: e,
        })?;
    info!(%remote, "udp sender ready");

    let socket = Arc::new(socket);
    let key = ConnectionKey::from(format!("udpout:{remote}"));
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
    let conn = Connection::new(key.clone(), EndpointKind::UdpOut, tx);
    if events.send(LinkEvent::Connected(conn)).await.is_err() {
        return Ok(());
    }

    tokio::spawn(connected_writer(Arc::clone(&socket), rx));
    tokio::spawn(run_udp_out(socket, key, events, cancel));
    Ok(())
}

async fn run_udp_out<M: Message>(
    socket: Arc<UdpSocket>,
    key: ConnectionKey,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; 65536];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            received = socket.recv(&mut buf) => {
                let n = match received {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(key = %key, error = %e, "udp recv failed");
                        continue;
                    }
                };
                match decode_datagram::<M>(&key, &buf[..n]) {
                    Ok(frame) => {
                        let event = LinkEvent::Frame { key: key.clone(), frame };
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        debug!(key = %key, %error, "dropping udp datagram");
                        let event = LinkEvent::FrameError { key: key.clone(), error };
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn connected_writer(socket: Arc<UdpSocket>, mut rx: mpsc::Receiver<Bytes>) {
    while let Some(raw) = rx.recv().await {
        if let Err(e) = socket.send(&raw).await {
            warn!(error = %e, "udp send failed");
        }
    }
}

fn unspecified_for(remote: SocketAddr) -> SocketAddr {
    match remote {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}
