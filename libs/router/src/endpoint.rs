//! Bridges parsed endpoint specs to their network adapters.

use mavswitch_codec::Message;
use mavswitch_network::{
    spawn_serial, spawn_tcp_out, spawn_udp_in, spawn_udp_out, LinkEvent, UartPool,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::EndpointSpec;
use crate::error::RouterError;

/// Start the adapter task for one endpoint. Bind/open failures (and pool
/// exhaustion for serial) surface here as startup errors; outbound TCP
/// performs its own connect-and-retry and cannot fail at startup.
pub async fn spawn_endpoint<M: Message>(
    spec: &EndpointSpec,
    events: mpsc::Sender<LinkEvent<M>>,
    pool: &UartPool,
    cancel: CancellationToken,
) -> Result<(), RouterError> {
    match spec {
        EndpointSpec::UdpIn(addr) => spawn_udp_in(*addr, events, cancel).await?,
        EndpointSpec::UdpOut(addr) => spawn_udp_out(*addr, events, cancel).await?,
        EndpointSpec::TcpOut(addr) => spawn_tcp_out(*addr, events, cancel),
        EndpointSpec::Serial { device, baud } => {
            spawn_serial(device, *baud, pool, events, cancel).await?
        }
    }
    Ok(())
}
