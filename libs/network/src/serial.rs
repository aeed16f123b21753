//! Serial adapter.
//!
//! Framing is identical to TCP. The UART handle is checked out of the
//! bounded pool before the first open and held for the adapter's lifetime;
//! on port errors the adapter closes the stream and reopens the same pooled
//! device after the retry delay.

use std::time::Duration;

use mavswitch_codec::Message;
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::connection::{Connection, ConnectionKey, EndpointKind, LinkEvent, OUTBOUND_QUEUE};
use crate::error::NetworkError;
use crate::pool::{UartHandle, UartPool};
use crate::stream::run_stream;

const REOPEN_DELAY: Duration = Duration::from_secs(1);

/// Check a UART handle out of the pool, open the port, and spawn the serial
/// task. A device that cannot be opened at startup is a startup error.
pub async fn spawn_serial<M: Message>(
    device: &str,
    baud: u32,
    pool: &UartPool,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) -> Result<(), NetworkError> {
    let handle = pool.checkout(device).await?;
    let stream = open_port(handle.device(), baud)?;
    info!(device, baud, "serial port opened");

    tokio::spawn(run_serial::<M>(handle, baud, stream, events, cancel));
    Ok(())
}

fn open_port(device: &str, baud: u32) -> Result<SerialStream, NetworkError> {
    #[allow(unused_mut)]
    let mut port = tokio_serial::new(device, baud)
        .open_native_async()
        .map_err(|e| NetworkError::PortNotAttached {
            device: device.to_string(),
            source: e,
        })?;

    #[cfg(unix)]
    if let Err(e) = port.set_exclusive(false) {
        warn!(device, error = %e, "failed to clear exclusive mode");
    }

    Ok(port)
}

async fn run_serial<M: Message>(
    handle: UartHandle,
    baud: u32,
    stream: SerialStream,
    events: mpsc::Sender<LinkEvent<M>>,
    cancel: CancellationToken,
) {
    let key = ConnectionKey::from(format!("serial:{}", handle.device()));
    let mut stream = stream;

    loop {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let conn = Connection::new(key.clone(), EndpointKind::Serial, tx);
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

        // Reopen the same pooled device until it comes back.
        stream = loop {
            tokio::select! {
                _ = tokio::time::sleep(REOPEN_DELAY) => {}
                _ = cancel.cancelled() => return,
            }
            match open_port(handle.device(), baud) {
                Ok(stream) => {
                    info!(device = handle.device(), "serial port reopened");
                    break stream;
                }
                Err(e) => {
                    warn!(device = handle.device(), error = %e, "serial reopen failed");
                }
            }
        };
    }
}
