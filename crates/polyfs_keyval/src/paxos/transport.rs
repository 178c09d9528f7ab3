use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use super::wire::{self, Message};

/// Fire-and-forget message fan-out between replicas. A broadcast reaches
/// every replica on the network, the sender included; handlers tolerate
/// duplicates and loss.
pub trait Transport: Send + Sync + 'static {
    fn broadcast(&self, msg: &Message);
}

/// An in-process network for tests: every endpoint's broadcast is
/// delivered to all endpoints through unbounded channels. Individual
/// endpoints can be disabled to simulate a dead replica.
#[derive(Default)]
pub struct LoopbackNet {
    endpoints: Mutex<Vec<EndpointState>>,
}

struct EndpointState {
    tx: mpsc::UnboundedSender<Message>,
    enabled: Arc<AtomicBool>,
}

impl LoopbackNet {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds an endpoint, returning its transport half and inbox.
    pub fn endpoint(self: &Arc<Self>) -> (Arc<LoopbackTransport>, mpsc::UnboundedReceiver<Message>)
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let enabled = Arc::new(AtomicBool::new(true));
        self.endpoints
            .lock()
            .expect("lock is poisoned")
            .push(EndpointState {
                tx,
                enabled: Arc::clone(&enabled),
            });
        let transport = Arc::new(LoopbackTransport {
            net: Arc::clone(self),
            enabled,
        });
        (transport, rx)
    }

    /// Enables or disables endpoint `index`. A disabled endpoint neither
    /// receives nor sends.
    pub fn set_enabled(&self, index: usize, enabled: bool) {
        let endpoints = self.endpoints.lock().expect("lock is poisoned");
        if let Some(endpoint) = endpoints.get(index) {
            endpoint.enabled.store(enabled, Ordering::Release);
        }
    }

    fn deliver(&self, msg: &Message) {
        let endpoints = self.endpoints.lock().expect("lock is poisoned");
        for endpoint in endpoints.iter() {
            if endpoint.enabled.load(Ordering::Acquire) {
                // A closed inbox just means the replica is gone.
                let _ = endpoint.tx.send(msg.clone());
            }
        }
    }
}

pub struct LoopbackTransport {
    net: Arc<LoopbackNet>,
    enabled: Arc<AtomicBool>,
}

impl Transport for LoopbackTransport {
    fn broadcast(&self, msg: &Message) {
        if self.enabled.load(Ordering::Acquire) {
            self.net.deliver(msg);
        }
    }
}

/// Datagram transport over UDP. Each replica binds one socket and
/// broadcasts by sending the encoded message to every peer address,
/// its own included.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peers: Vec<SocketAddr>,
}

impl UdpTransport {
    /// Binds `addr` and spawns the receive pump. `peers` must list every
    /// replica address, including this one.
    pub async fn bind(
        addr: SocketAddr,
        peers: Vec<SocketAddr>,
    ) -> std::io::Result<(Arc<Self>, mpsc::UnboundedReceiver<Message>)> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let (tx, rx) = mpsc::unbounded_channel();

        let recv_socket = Arc::clone(&socket);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let Ok((len, from)) = recv_socket.recv_from(&mut buf).await else {
                    break;
                };
                match wire::decode_message(&buf[..len]) {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%from, %err, "dropping undecodable datagram");
                    }
                }
            }
        });

        Ok((Arc::new(Self { socket, peers }), rx))
    }
}

impl Transport for UdpTransport {
    fn broadcast(&self, msg: &Message) {
        let bytes = wire::encode_message(msg);
        for peer in &self.peers {
            // Datagram loss is recovered by the protocol's retry timers.
            if let Err(err) = self.socket.try_send_to(&bytes, *peer) {
                tracing::trace!(%peer, %err, "datagram send failed");
            }
        }
    }
}
