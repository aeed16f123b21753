//! Shared read/write loop for stream transports (TCP and serial).

use bytes::Bytes;
use mavswitch_codec::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionKey, LinkEvent};
use crate::framing::StreamParser;

/// Run one connected stream until it closes, errors, or is cancelled.
/// Inbound bytes are reframed and decoded into events; outbound raw frames
/// are drained from the connection's channel and written through.
pub(crate) async fn run_stream<M, S>(
    stream: S,
    mut outbound: mpsc::Receiver<Bytes>,
    key: &ConnectionKey,
    events: &mpsc::Sender<LinkEvent<M>>,
    cancel: &CancellationToken,
) where
    M: Message,
    S: AsyncRead + AsyncWrite,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut parser = StreamParser::new();
    let mut chunk = [0u8; 4096];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    info!(key = %key, "stream closed by peer");
                    return;
                }
                Ok(n) => {
                    parser.push(&chunk[..n]);
                    while let Some(result) = parser.next_frame::<M>() {
                        match result {
                            Ok(frame) => {
                                let event = LinkEvent::Frame {
                                    key: key.clone(),
                                    frame,
                                };
                                if events.send(event).await.is_err() {
                                    return;
                                }
                            }
                            Err(error) => {
                                debug!(key = %key, %error, "dropping invalid bytes");
                                let event = LinkEvent::FrameError {
                                    key: key.clone(),
                                    error,
                                };
                                if events.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "stream read failed");
                    return;
                }
            },

            raw = outbound.recv() => match raw {
                Some(raw) => {
                    if let Err(e) = writer.write_all(&raw).await {
                        warn!(key = %key, error = %e, "stream write failed");
                        return;
                    }
                }
                // The router dropped this connection record.
                None => return,
            },
        }
    }
}
