//! IPv4 protocol support
//!
//! The fabric routes on a single field of the network-layer header: the
//! destination address. This module provides:
//! - a cheap peek at that field for the forwarding path
//! - header creation and serialization with automatic checksum, used by
//!   callers building frames

use std::net::Ipv4Addr;

use crate::network::checksum;
use byteorder::{BigEndian, ByteOrder};

pub const IPV4_HEADER_LEN: usize = 20;
const IPV4_VERSION: u8 = 4;
const DEFAULT_IHL: u8 = 5; // 5 * 4 = 20 bytes (standard header length)
const DEFAULT_TTL: u8 = 64;
const DST_ADDR_OFFSET: usize = 16;

/// IPv4 packet header structure
///
/// Represents the standard 20-byte IPv4 header as defined in RFC 791
#[derive(Debug, Clone)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8, // Internet Header Length
    pub tos: u8, // Type of Service
    pub total_len: u16,
    pub id: u16,
    pub flags_frag_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_addr: [u8; 4],
    pub dst_addr: [u8; 4],
}

impl Ipv4Header {
    /// Create a header carrying `payload_len` bytes with commonly used defaults
    ///
    /// The checksum is left at zero; see [`Ipv4Header::update_checksum`].
    pub fn new_simple(protocol: u8, src: Ipv4Addr, dst: Ipv4Addr, payload_len: u16) -> Self {
        Ipv4Header {
            version: IPV4_VERSION,
            ihl: DEFAULT_IHL,
            tos: 0,
            total_len: payload_len.saturating_add(IPV4_HEADER_LEN as u16),
            id: 0,
            flags_frag_offset: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src_addr: src.octets(),
            dst_addr: dst.octets(),
        }
    }

    /// Convert IPv4 header to bytes
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        bytes[0] = (self.version << 4) | self.ihl;
        bytes[1] = self.tos;
        BigEndian::write_u16(&mut bytes[2..4], self.total_len);
        BigEndian::write_u16(&mut bytes[4..6], self.id);
        BigEndian::write_u16(&mut bytes[6..8], self.flags_frag_offset);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        BigEndian::write_u16(&mut bytes[10..12], self.checksum);
        bytes[12..16].copy_from_slice(&self.src_addr);
        bytes[16..20].copy_from_slice(&self.dst_addr);

        bytes
    }

    /// Recalculate the checksum field after modifying header fields
    pub fn update_checksum(&mut self) {
        let mut bytes = self.to_bytes();
        bytes[10..12].copy_from_slice(&[0, 0]);
        self.checksum = checksum(&bytes);
    }

    /// Serialize this header followed by `payload`
    ///
    /// The total length and checksum are fixed up to match the payload.
    /// Returns None if the packet would not fit the 16-bit total length.
    pub fn with_payload(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let total_len = u16::try_from(IPV4_HEADER_LEN + payload.len()).ok()?;
        let mut header = self.clone();
        header.total_len = total_len;
        header.update_checksum();
        let mut packet = Vec::with_capacity(total_len as usize);
        packet.extend_from_slice(&header.to_bytes());
        packet.extend_from_slice(payload);
        Some(packet)
    }
}

/// Read the destination address of an IPv4 packet
///
/// Only the address field is interpreted; version, options and checksum are
/// not checked. Returns None if the packet is shorter than a header.
pub fn peek_destination(packet: &[u8]) -> Option<Ipv4Addr> {
    if packet.len() < IPV4_HEADER_LEN {
        return None;
    }
    Some(Ipv4Addr::from(BigEndian::read_u32(
        &packet[DST_ADDR_OFFSET..DST_ADDR_OFFSET + 4],
    )))
}

/// IPv4 protocol numbers
pub mod protocol {
    pub const UDP: u8 = 17;
}
