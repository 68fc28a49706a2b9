//! Destination resolution and link-layer header construction.
//!
//! Plays the part ARP would on a real link: a destination IPv4 address is
//! turned into the interface that owns it and that interface's MAC address,
//! using the fabric's [`AddressBook`] rather than any request/reply exchange.

use std::net::Ipv4Addr;

use crate::iface::address_book::AddressBook;
use crate::iface::interface::Interface;
use crate::iface::InterfaceId;
use crate::network::ethernet::{EthernetHeader, MacAddress};

/// A resolved destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub interface: InterfaceId,
    /// Unspecified until the owning interface has been opened
    pub mac: MacAddress,
}

pub struct HeaderResolver<'a> {
    book: &'a AddressBook,
    interfaces: &'a [Interface],
}

impl<'a> HeaderResolver<'a> {
    pub fn new(book: &'a AddressBook, interfaces: &'a [Interface]) -> Self {
        HeaderResolver { book, interfaces }
    }

    /// Find the interface owning `destination` and its link-layer address
    ///
    /// `None` means unresolved; callers decide how to drop.
    pub fn resolve(&self, destination: Ipv4Addr) -> Option<Resolution> {
        let interface = self.book.lookup(destination)?;
        let Some(owner) = self.interfaces.get(interface.index()) else {
            tracing::warn!(%destination, %interface, "address table points past the interface list");
            return None;
        };
        Some(Resolution {
            interface,
            mac: owner.hw_addr().unwrap_or(MacAddress::UNSPECIFIED),
        })
    }

    /// Build the link-layer header for a frame sent from `source`
    ///
    /// The destination is `daddr` when given, otherwise the resolved MAC of
    /// `destination_ip`. When neither is available the destination stays
    /// unspecified and the returned flag is false: the send has failed.
    pub fn build_header(
        &self,
        source: MacAddress,
        destination_ip: Ipv4Addr,
        ethertype: u16,
        daddr: Option<MacAddress>,
    ) -> (EthernetHeader, bool) {
        let destination = match daddr {
            Some(mac) => Some(mac),
            None => self.resolve(destination_ip).map(|r| r.mac),
        };
        let resolved = destination.is_some();
        let header = EthernetHeader::new(
            destination.unwrap_or(MacAddress::UNSPECIFIED),
            source,
            ethertype,
        );
        (header, resolved)
    }
}
