//! Fixed-layout encoding and decoding of Ethernet and ARP headers.
//!
//! All multi-byte fields are in network byte order.
//!
//! Ethernet header (14 bytes):
//!
//! | offset | field       |
//! |--------|-------------|
//! | 0..6   | destination |
//! | 6..12  | source      |
//! | 12..14 | ether type  |
//!
//! ARP header (28 bytes, Ethernet/IPv4 layout):
//!
//! | offset | field                   |
//! |--------|-------------------------|
//! | 0..2   | hardware type           |
//! | 2..4   | protocol type           |
//! | 4      | hardware address length |
//! | 5      | protocol address length |
//! | 6..8   | operation               |
//! | 8..14  | sender hardware address |
//! | 14..18 | sender protocol address |
//! | 18..24 | target hardware address |
//! | 24..28 | target protocol address |
//!
//! Decoding only checks the input length. Declared address lengths and the
//! operation code are carried through untouched; interpreting them is up to the
//! caller.

use std::net::Ipv4Addr;

use pnet::{
    packet::{
        arp::{
            ArpHardwareType, ArpHardwareTypes, ArpOperation, ArpOperations, ArpPacket,
            MutableArpPacket,
        },
        ethernet::{EtherType, EtherTypes, EthernetPacket, MutableEthernetPacket},
    },
    util::MacAddr,
};

use crate::constants::{ARP_PACK_LEN, ETH_HEADER_LEN, ETH_PACK_LEN, IP_V4_LEN, MAC_ADDR_LEN};
use crate::error::{Error, Result};

fn truncated(expected: usize, actual: usize) -> Error {
    Error::TruncatedFrame { expected, actual }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ether_type: EtherType,
}

impl EthernetHeader {
    pub const LEN: usize = ETH_HEADER_LEN;

    /// Writes the header into the first 14 bytes of `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        let actual = buf.len();
        let mut packet = MutableEthernetPacket::new(buf).ok_or(truncated(Self::LEN, actual))?;
        packet.set_destination(self.destination);
        packet.set_source(self.source);
        packet.set_ethertype(self.ether_type);
        Ok(())
    }

    /// Reads a header from the first 14 bytes of `bytes`, ignoring anything after.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let packet = EthernetPacket::new(bytes).ok_or(truncated(Self::LEN, bytes.len()))?;
        Ok(Self {
            destination: packet.get_destination(),
            source: packet.get_source(),
            ether_type: packet.get_ethertype(),
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ArpHeader {
    pub hardware_type: ArpHardwareType,
    pub protocol_type: EtherType,
    pub hw_addr_len: u8,
    pub proto_addr_len: u8,
    pub operation: ArpOperation,
    pub sender_hw_addr: MacAddr,
    pub sender_proto_addr: Ipv4Addr,
    pub target_hw_addr: MacAddr,
    pub target_proto_addr: Ipv4Addr,
}

impl ArpHeader {
    pub const LEN: usize = ARP_PACK_LEN;

    /// A who-has request for `target_ip` on Ethernet/IPv4.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            hardware_type: ArpHardwareTypes::Ethernet,
            protocol_type: EtherTypes::Ipv4,
            hw_addr_len: MAC_ADDR_LEN,
            proto_addr_len: IP_V4_LEN,
            operation: ArpOperations::Request,
            sender_hw_addr: sender_mac,
            sender_proto_addr: sender_ip,
            target_hw_addr: MacAddr::zero(),
            target_proto_addr: target_ip,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.operation == ArpOperations::Reply
    }

    /// Writes the header into the first 28 bytes of `buf`.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        let actual = buf.len();
        let mut packet = MutableArpPacket::new(buf).ok_or(truncated(Self::LEN, actual))?;
        packet.set_hardware_type(self.hardware_type);
        packet.set_protocol_type(self.protocol_type);
        packet.set_hw_addr_len(self.hw_addr_len);
        packet.set_proto_addr_len(self.proto_addr_len);
        packet.set_operation(self.operation);
        packet.set_sender_hw_addr(self.sender_hw_addr);
        packet.set_sender_proto_addr(self.sender_proto_addr);
        packet.set_target_hw_addr(self.target_hw_addr);
        packet.set_target_proto_addr(self.target_proto_addr);
        Ok(())
    }

    /// Reads a header from the first 28 bytes of `bytes`, ignoring anything after.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let packet = ArpPacket::new(bytes).ok_or(truncated(Self::LEN, bytes.len()))?;
        Ok(Self {
            hardware_type: packet.get_hardware_type(),
            protocol_type: packet.get_protocol_type(),
            hw_addr_len: packet.get_hw_addr_len(),
            proto_addr_len: packet.get_proto_addr_len(),
            operation: packet.get_operation(),
            sender_hw_addr: packet.get_sender_hw_addr(),
            sender_proto_addr: packet.get_sender_proto_addr(),
            target_hw_addr: packet.get_target_hw_addr(),
            target_proto_addr: packet.get_target_proto_addr(),
        })
    }
}

/// Builds a complete broadcast ARP request frame asking who has `target_ip`.
pub fn request_frame(
    sender_mac: MacAddr,
    sender_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
) -> Result<[u8; ETH_PACK_LEN]> {
    let mut frame = [0; ETH_PACK_LEN];
    let ethernet = EthernetHeader {
        destination: MacAddr::broadcast(),
        source: sender_mac,
        ether_type: EtherTypes::Arp,
    };
    ethernet.encode_into(&mut frame[..EthernetHeader::LEN])?;
    ArpHeader::request(sender_mac, sender_ip, target_ip)
        .encode_into(&mut frame[EthernetHeader::LEN..])?;
    Ok(frame)
}
