use std::net::{IpAddr, Ipv4Addr};

use ipnet::Ipv4Net;
use pnet::{datalink, datalink::NetworkInterface, util::MacAddr};

use crate::error::{Error, Result};

/// The parts of a host network interface the prober cares about.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct LocalInterface {
    pub name: String,
    pub index: u32,
    pub mac: Option<MacAddr>,
    pub up: bool,
    /// Configured IPv4 addresses with their prefix lengths, in host order.
    pub networks: Vec<Ipv4Net>,
}

impl LocalInterface {
    /// Returns true when `addr` is one of this interface's own addresses.
    pub fn owns(&self, addr: Ipv4Addr) -> bool {
        self.networks.iter().any(|net| net.addr() == addr)
    }

    /// Primary IPv4 address; unspecified when the interface has none.
    pub fn source_ipv4(&self) -> Ipv4Addr {
        self.networks
            .first()
            .map(Ipv4Net::addr)
            .unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    /// Sender address for a request to `target`.
    ///
    /// This is the address of the narrowest subnet containing `target`, so
    /// multi-homed interfaces ask from the address the target can answer to.
    /// Falls back to [`source_ipv4`](Self::source_ipv4) when no subnet matches.
    pub fn source_ipv4_for(&self, target: Ipv4Addr) -> Ipv4Addr {
        self.networks
            .iter()
            .filter(|net| net.contains(&target))
            .fold(None, |best: Option<&Ipv4Net>, net| match best {
                Some(best) if best.prefix_len() >= net.prefix_len() => Some(best),
                _ => Some(net),
            })
            .map(Ipv4Net::addr)
            .unwrap_or_else(|| self.source_ipv4())
    }
}

impl From<&NetworkInterface> for LocalInterface {
    fn from(interface: &NetworkInterface) -> Self {
        let networks = interface
            .ips
            .iter()
            .filter_map(|net| match net.ip() {
                IpAddr::V4(ipv4) => Ipv4Net::new(ipv4, net.prefix()).ok(),
                IpAddr::V6(_) => None,
            })
            .collect();
        Self {
            name: interface.name.clone(),
            index: interface.index,
            mac: interface.mac,
            up: interface.is_up(),
            networks,
        }
    }
}

/// Lists the host's interfaces.
pub fn local_interfaces() -> Vec<LocalInterface> {
    datalink::interfaces()
        .iter()
        .map(LocalInterface::from)
        .collect()
}

/// Picks the up interface whose subnet contains `target` with the longest prefix.
///
/// When several subnets of equal length contain the target, the first one
/// encountered wins.
///
/// # Errors
/// Returns [`Error::NoInterfaceFound`] when no up interface has a subnet
/// containing the target.
pub fn resolve(target: Ipv4Addr, interfaces: &[LocalInterface]) -> Result<&LocalInterface> {
    let mut best: Option<(&LocalInterface, u8)> = None;
    for interface in interfaces.iter().filter(|interface| interface.up) {
        for net in interface.networks.iter().filter(|net| net.contains(&target)) {
            if best.map_or(true, |(_, longest)| net.prefix_len() > longest) {
                best = Some((interface, net.prefix_len()));
            }
        }
    }
    best.map(|(interface, _)| interface)
        .ok_or(Error::NoInterfaceFound(target))
}

/// Resolves `target` against the host's current interface configuration.
pub fn resolve_local(target: Ipv4Addr) -> Result<LocalInterface> {
    resolve(target, &local_interfaces()).cloned()
}
