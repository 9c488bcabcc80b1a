use afpacket::tokio::{FilterProgram, RawPacketStream};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

use crate::{
    error::{Error, Result},
    interface::LocalInterface,
};

/// Classic BPF program accepting only frames whose ether type is ARP.
///
/// `ldh [12]; jeq #0x0806, accept, drop; accept: ret #0xffff; drop: ret #0`
pub(crate) fn arp_filter() -> FilterProgram {
    vec![
        (0x28, 0, 0, 12),
        (0x15, 0, 1, 0x0806),
        (0x06, 0, 0, 0xffff),
        (0x06, 0, 0, 0),
    ]
}

/// Opens a raw link-layer stream bound to `interface_name` that only delivers
/// ARP frames.
///
/// Frames queued before the filter was attached are drained, so nothing from
/// other interfaces or other protocols reaches the sniffer.
///
/// # Errors
/// Returns [`Error::BindError`] if the socket cannot be created (usually missing
/// `CAP_NET_RAW`), bound to the interface or given its filter.
pub fn open(interface_name: &str) -> Result<RawPacketStream> {
    let bind_error = |source| Error::BindError {
        interface: interface_name.to_string(),
        source,
    };
    let mut stream = RawPacketStream::new().map_err(bind_error)?;
    stream.bind(interface_name).map_err(bind_error)?;
    stream.set_bpf_filter(arp_filter()).map_err(bind_error)?;
    stream.drain();
    Ok(stream)
}

/// The sending half of one interface, shared read-only by the prober.
#[derive(Debug)]
pub struct Binding<S> {
    interface: LocalInterface,
    stream: Mutex<S>,
}

impl<S> Binding<S>
where
    S: AsyncWrite + Unpin,
{
    pub fn new(interface: LocalInterface, stream: S) -> Self {
        Self {
            interface,
            stream: Mutex::new(stream),
        }
    }

    pub fn interface(&self) -> &LocalInterface {
        &self.interface
    }

    /// Writes one whole frame to the interface.
    ///
    /// # Errors
    /// Returns [`Error::SendError`] if the write fails.
    pub async fn send(&self, frame: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock().await;
        write_frame(&mut *stream, frame)
            .await
            .map_err(|err| Error::SendError {
                interface: self.interface.name.clone(),
                reason: err.to_string(),
            })
    }
}

async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, frame: &[u8]) -> std::io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}
