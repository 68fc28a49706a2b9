//! Network and link layer formats used on the fabric
//!
//! This module contains:
//! - Ethernet: the 14-byte link-layer header and MAC addresses
//! - IPv4: header model and the destination-address peek used for routing

pub mod ethernet;
pub mod ipv4;

// Re-export commonly used items
pub use ethernet::{EthernetHeader, MacAddress, ETH_FRAME_LEN, ETH_HLEN, ETH_ZLEN};
pub use ipv4::{protocol, Ipv4Header};

/// Calculate Internet checksum
///
/// Algorithm: Sum data in 16-bit chunks, add carry bits to the sum,
/// and return the one's complement of the result.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;

    for chunk in data.chunks_exact(2) {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    // Odd-length data is padded with a zero byte
    if data.len() % 2 != 0 {
        if let Some(&last_byte) = data.last() {
            sum += (last_byte as u32) << 8;
        }
    }

    while (sum >> 16) > 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}
