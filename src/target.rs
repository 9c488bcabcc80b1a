use std::{net::Ipv4Addr, time::SystemTime};

use pnet::util::MacAddr;

/// One hardware address seen claiming a target address within a batch.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ObservedOwner {
    /// Source of the reply frame. For a local owner this is the interface's own
    /// address, when it has one.
    pub hardware_address: Option<MacAddr>,
    pub observed_at: SystemTime,
    /// Set when the probing interface itself holds the address; no reply was needed.
    pub is_local_own: bool,
}

impl ObservedOwner {
    pub fn remote(hardware_address: MacAddr) -> Self {
        Self {
            hardware_address: Some(hardware_address),
            observed_at: SystemTime::now(),
            is_local_own: false,
        }
    }

    pub fn local(hardware_address: Option<MacAddr>) -> Self {
        Self {
            hardware_address,
            observed_at: SystemTime::now(),
            is_local_own: true,
        }
    }
}

/// An ARP reply as published by a sniffer: who claimed `address`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Observation {
    pub address: Ipv4Addr,
    pub owner: ObservedOwner,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Resolution {
    /// Nobody answered.
    Absent,
    /// Exactly one claimant, or only local ones.
    Resolved,
    /// More than one claimant, at least one of them remote.
    Conflict,
}

impl Resolution {
    pub fn of(owners: &[ObservedOwner]) -> Self {
        match owners {
            [] => Resolution::Absent,
            [_] => Resolution::Resolved,
            _ if owners.iter().all(|owner| owner.is_local_own) => Resolution::Resolved,
            _ => Resolution::Conflict,
        }
    }
}

/// A configured address bound to the interface it is probed from.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Target {
    address: Ipv4Addr,
    interface: String,
    owners: Vec<ObservedOwner>,
}

impl Target {
    pub fn new(address: Ipv4Addr, interface: impl Into<String>) -> Self {
        Self {
            address,
            interface: interface.into(),
            owners: Vec::new(),
        }
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Owners seen during the most recent batch that covered this target.
    pub fn owners(&self) -> &[ObservedOwner] {
        &self.owners
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::of(&self.owners)
    }

    pub(crate) fn reset(&mut self) {
        self.owners.clear();
    }

    pub(crate) fn record(&mut self, owner: ObservedOwner) {
        self.owners.push(owner);
    }
}
