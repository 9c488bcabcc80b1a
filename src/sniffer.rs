use log::{debug, error, warn};
use pnet::packet::ethernet::EtherTypes;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::codec::{ArpHeader, EthernetHeader};
use crate::constants::{CAPTURE_BUF_LEN, READ_RETRY_DELAY};
use crate::error::{Error, Result};
use crate::target::{Observation, ObservedOwner};

/// Capture loop for one interface. Publishes every ARP reply it sees and never
/// looks at target state.
pub(crate) struct Sniffer<R> {
    interface: String,
    stream: R,
    queue: mpsc::Sender<Observation>,
}

impl<R> Sniffer<R>
where
    R: AsyncRead + Unpin,
{
    pub(crate) fn new(
        interface: impl Into<String>,
        stream: R,
        queue: mpsc::Sender<Observation>,
    ) -> Self {
        Self {
            interface: interface.into(),
            stream,
            queue,
        }
    }

    /// Runs until the stream ends or the prober drops its receiver. A full queue
    /// blocks the loop until the prober catches up.
    pub(crate) async fn listen(&mut self) -> Result<()> {
        let mut buf = vec![0; CAPTURE_BUF_LEN];
        loop {
            let read_bytes = match self.stream.read(&mut buf).await {
                Ok(0) => {
                    return Err(Error::Opaque(
                        format!("capture stream on {} reached end of stream", self.interface)
                            .into(),
                    ))
                }
                Ok(read_bytes) => read_bytes,
                Err(err) => {
                    warn!("failed to read from {}, reason: {}", self.interface, err);
                    tokio::time::sleep(READ_RETRY_DELAY).await;
                    continue;
                }
            };
            let Some(observation) = parse_reply(&buf[..read_bytes]) else {
                continue;
            };
            debug!(
                "{}: {} is at {:?}",
                self.interface, observation.address, observation.owner.hardware_address
            );
            if self.queue.send(observation).await.is_err() {
                return Err(Error::CaptureClosed);
            }
        }
    }
}

/// Extracts the claimed address and the claimant's hardware address from an
/// Ethernet frame carrying an ARP reply. Everything else yields `None`.
pub(crate) fn parse_reply(frame: &[u8]) -> Option<Observation> {
    let ethernet = EthernetHeader::decode(frame).ok()?;
    if ethernet.ether_type != EtherTypes::Arp {
        return None;
    }
    let arp = ArpHeader::decode(&frame[EthernetHeader::LEN..]).ok()?;
    if !arp.is_reply() {
        return None;
    }
    Some(Observation {
        address: arp.sender_proto_addr,
        owner: ObservedOwner::remote(ethernet.source),
    })
}

/// Owns the background capture tasks and cancels them when dropped.
#[derive(Debug)]
pub(crate) struct BackgroundTaskSpawner {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTaskSpawner {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub(crate) fn spawn<R>(&mut self, mut sniffer: Sniffer<R>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let token = self.token.clone();
        let interface = sniffer.interface.clone();
        let handle = tokio::task::spawn(async move {
            tokio::select! {
                result = sniffer.listen() => {
                    if let Err(err) = result {
                        error!("capture loop on {} stopped: {}", interface, err);
                    }
                },
                _ = token.cancelled() => {
                }
            }
        });
        self.handles.push(handle);
    }
}

impl Drop for BackgroundTaskSpawner {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.token.cancel();
        }
    }
}
