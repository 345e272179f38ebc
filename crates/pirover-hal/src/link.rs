//! [`ControlLink`] – periodic UDP transmission of the control packet.
//!
//! The rover expects the full register block at a steady cadence rather than
//! one datagram per input event, so the link samples the shared
//! [`ControlState`] on a fixed interval and sends whatever it holds.  A lost
//! datagram is simply superseded by the next tick.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pirover_types::RoverError;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::control::ControlState;

/// Default interval between control packets.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Handle to a running control link task.
pub struct ControlLink {
    remote: SocketAddr,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ControlLink {
    /// Bind an ephemeral local socket, connect it to `remote` and start
    /// sending `state` every `period`.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::Link`] when the socket cannot be bound or
    /// connected.
    pub async fn spawn(
        remote: SocketAddr,
        state: Arc<ControlState>,
        period: Duration,
    ) -> Result<Self, RoverError> {
        let bind_addr: SocketAddr = if remote.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| RoverError::Link(format!("bind {bind_addr} failed: {e}")))?;
        socket
            .connect(remote)
            .await
            .map_err(|e| RoverError::Link(format!("connect {remote} failed: {e}")))?;

        info!(%remote, period_ms = period.as_millis() as u64, "control link started");

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run(socket, state, period, stop_rx));
        Ok(Self {
            remote,
            stop_tx,
            task,
        })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Stop the link.  One final packet carrying the current registers is
    /// sent before the task exits.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "control link task ended abnormally");
        }
    }
}

async fn run(
    socket: UdpSocket,
    state: Arc<ControlState>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => send_packet(&socket, &state).await,
        }
    }

    send_packet(&socket, &state).await;
    debug!("control link stopped");
}

async fn send_packet(socket: &UdpSocket, state: &ControlState) {
    let packet = state.packet();
    if let Err(e) = socket.send(&packet).await {
        // Retried implicitly on the next tick.
        warn!(error = %e, "control packet send failed");
    }
}
