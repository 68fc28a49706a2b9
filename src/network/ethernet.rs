//! Ethernet (link layer) framing
//!
//! This module provides the 14-byte link-layer header that every frame on the
//! fabric carries, plus the MAC address type interfaces are configured with.
//!
//! Layout of the header:
//! - destination MAC (6 bytes)
//! - source MAC (6 bytes)
//! - ethertype (2 bytes, big endian)

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};

/// Length of a MAC address in bytes
pub const ETH_ALEN: usize = 6;
/// Length of the link-layer header in bytes
pub const ETH_HLEN: usize = 14;
/// Minimum frame length (without FCS); shorter frames are zero padded
pub const ETH_ZLEN: usize = 60;
/// Maximum payload carried after the link-layer header
pub const ETH_DATA_LEN: usize = 1500;
/// Maximum frame length (header + payload)
pub const ETH_FRAME_LEN: usize = ETH_HLEN + ETH_DATA_LEN;

/// Ethertype values
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
}

/// A 48-bit link-layer address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; ETH_ALEN]);

impl MacAddress {
    /// All-zero address, used as the "unresolved" sentinel
    pub const UNSPECIFIED: MacAddress = MacAddress([0; ETH_ALEN]);
    pub const BROADCAST: MacAddress = MacAddress([0xff; ETH_ALEN]);

    pub fn octets(&self) -> [u8; ETH_ALEN] {
        self.0
    }

    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }
}

/// Reason a MAC address string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacParseError {
    #[error("expected 6 colon-separated segments, got {0}")]
    SegmentCount(usize),
    #[error("segment {index} ({segment:?}) must be exactly two characters")]
    SegmentLength { index: usize, segment: String },
    #[error("segment {index} ({segment:?}) is not hexadecimal")]
    NotHex { index: usize, segment: String },
}

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Parse `aa:bb:cc:dd:ee:ff`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.trim().split(':').collect();
        if segments.len() != ETH_ALEN {
            return Err(MacParseError::SegmentCount(segments.len()));
        }

        let mut octets = [0u8; ETH_ALEN];
        for (index, segment) in segments.iter().enumerate() {
            if segment.len() != 2 {
                return Err(MacParseError::SegmentLength {
                    index,
                    segment: segment.to_string(),
                });
            }
            if !segment.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(MacParseError::NotHex {
                    index,
                    segment: segment.to_string(),
                });
            }
            octets[index] = u8::from_str_radix(segment, 16).map_err(|_| MacParseError::NotHex {
                index,
                segment: segment.to_string(),
            })?;
        }

        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Link-layer header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub fn new(destination: MacAddress, source: MacAddress, ethertype: u16) -> Self {
        EthernetHeader {
            destination,
            source,
            ethertype,
        }
    }

    /// Parse the header from the front of a frame
    ///
    /// Returns None if the data is too short to contain a link-layer header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < ETH_HLEN {
            return None;
        }

        let mut destination = [0u8; ETH_ALEN];
        let mut source = [0u8; ETH_ALEN];
        destination.copy_from_slice(&data[0..6]);
        source.copy_from_slice(&data[6..12]);

        Some(EthernetHeader {
            destination: MacAddress(destination),
            source: MacAddress(source),
            ethertype: BigEndian::read_u16(&data[12..14]),
        })
    }

    pub fn to_bytes(&self) -> [u8; ETH_HLEN] {
        let mut bytes = [0u8; ETH_HLEN];
        self.write(&mut bytes);
        bytes
    }

    /// Serialize into the first `ETH_HLEN` bytes of `out`
    pub fn write(&self, out: &mut [u8]) {
        out[0..6].copy_from_slice(&self.destination.0);
        out[6..12].copy_from_slice(&self.source.0);
        BigEndian::write_u16(&mut out[12..14], self.ethertype);
    }

    /// Build a complete frame: this header followed by `payload`
    pub fn encapsulate(&self, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(ETH_HLEN + payload.len());
        frame.extend_from_slice(&self.to_bytes());
        frame.extend_from_slice(payload);
        frame
    }
}

/// Read the ethertype of a frame without parsing the addresses
pub fn peek_ethertype(frame: &[u8]) -> Option<u16> {
    frame.get(12..14).map(BigEndian::read_u16)
}
