//! Outbound TCP adapter with adapter-local reconnect.
//!
//! The task connects, registers the connection, and runs the shared stream
//! loop; when the stream ends it reports `Disconnected`, waits out the
//! retry delay, and re-registers with a fresh connection record. The router
//! only ever sees `Connected` / `Disconnected` transitions.

use std::net::SocketAddr;
use std::time::Duration;

use mavswitch_codec::Message;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::connection::{Connection, ConnectionKey, EndpointKind, LinkEvent, OUTBOUND_QUEUE};
use crate::stream::run_stream;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Spawn the persistent outbound TCP task. Connection failures are retried
/// forever (with the fixed delay) until cancelled, so startup succeeds even
/// when the remote is not up yet.
pub fn spawn_tcp_out<M: Message>(
    remote: SocketAddr,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) {
    tokio::spawn(run_tcp_out(remote, events, cancel));
}

async fn run_tcp_out<M: Message>(
    remote: SocketAddr,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) {
    let key = ConnectionKey::from(format!("tcpout:{remote}"));

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match TcpStream::connect(remote).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(%remote, error = %e, "failed to set TCP_NODELAY");
                }
                info!(%remote, "tcp connected");

                let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
                let conn = Connection::new(key.clone(), EndpointKind::TcpOut, tx);
                if events.send(LinkEvent::Connected(conn)).await.is_err() {
                    return;
                }

                run_stream(stream, rx, &key, &events, &cancel).await;

                if events
                    .send(LinkEvent::Disconnected(key.clone()))
                    .await
                    .is_err()
                {
                    return;
                }
                if cancel.is_cancelled() {
                    return;
                }
                warn!(%remote, "tcp stream ended, scheduling reconnect");
            }
            Err(e) => {
                warn!(%remote, error = %e, "tcp connect failed, retrying");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = cancel.cancelled() => return,
        }
    }
}
