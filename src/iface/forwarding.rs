//! Transmit path: moves a frame from a sending interface into the receive
//! path of the interface that owns its destination address.
//!
//! Every attempt runs the same short state machine and keeps nothing
//! between calls:
//!
//! ```text
//! Validating -> Resolving -> Enqueuing -> Delivered
//!      \            \            \
//!       +------------+------------+--> Dropped(reason)
//! ```
//!
//! Only the destination's lock is ever taken, and it is released before the
//! receive upcall runs, so a transmit never holds two interface locks.

use std::net::Ipv4Addr;

use tracing::{debug, trace};

use crate::error::{DropReason, FabricError, TransmitOutcome};
use crate::iface::address_book::AddressBook;
use crate::iface::buffer_pool::BUFFER_CAPACITY;
use crate::iface::interface::Interface;
use crate::iface::resolver::HeaderResolver;
use crate::iface::sink::DeliverySink;
use crate::iface::InterfaceId;
use crate::network::ethernet::{self, ethertype, MacAddress, ETH_HLEN, ETH_ZLEN};
use crate::network::ipv4::{self, IPV4_HEADER_LEN};

/// Shortest frame that still carries a destination address
pub const MIN_ROUTABLE_LEN: usize = ETH_HLEN + IPV4_HEADER_LEN;

pub struct ForwardingEngine<'a> {
    resolver: HeaderResolver<'a>,
    interfaces: &'a [Interface],
    sink: &'a dyn DeliverySink,
    print_packets: bool,
}

impl<'a> ForwardingEngine<'a> {
    pub fn new(
        book: &'a AddressBook,
        interfaces: &'a [Interface],
        sink: &'a dyn DeliverySink,
        print_packets: bool,
    ) -> Self {
        ForwardingEngine {
            resolver: HeaderResolver::new(book, interfaces),
            interfaces,
            sink,
            print_packets,
        }
    }

    /// Transmit `frame` from `source`.
    ///
    /// `Err` is reserved for caller mistakes (unknown or stopped source).
    /// Anything wrong with the frame or its destination comes back as
    /// [`TransmitOutcome::Dropped`] and leaves every interface untouched.
    pub fn transmit(&self, source: InterfaceId, frame: &[u8]) -> Result<TransmitOutcome, FabricError> {
        let sender = self
            .interfaces
            .get(source.index())
            .ok_or(FabricError::UnknownInterface(source))?;
        if !sender.is_up() {
            return Err(FabricError::QueueStopped(source));
        }

        // Validating
        if frame.len() < MIN_ROUTABLE_LEN {
            return Ok(self.dropped(source, DropReason::TooShort, frame.len()));
        }
        if frame.len() > BUFFER_CAPACITY {
            return Ok(self.dropped(source, DropReason::Oversized, frame.len()));
        }

        // Resolving
        let payload = &frame[ETH_HLEN..];
        let Some(destination_ip) = ipv4::peek_destination(payload) else {
            return Ok(self.dropped(source, DropReason::TooShort, frame.len()));
        };
        let Some(resolution) = self.resolver.resolve(destination_ip) else {
            trace!(%source, %destination_ip, "destination unresolved");
            return Ok(self.dropped(source, DropReason::NoRoute, frame.len()));
        };
        let Some(receiver) = self.interfaces.get(resolution.interface.index()) else {
            return Ok(self.dropped(source, DropReason::NoRoute, frame.len()));
        };
        let ethertype = ethernet::peek_ethertype(frame).unwrap_or(ethertype::IPV4);
        let source_mac = sender.hw_addr().unwrap_or(MacAddress::UNSPECIFIED);

        // Enqueuing
        let buffer = {
            let mut state = receiver.lock();
            if !state.admin_up {
                return Ok(self.dropped(source, DropReason::InterfaceDown, frame.len()));
            }
            // admin_up is only set once the address is known, and the
            // table is fixed after create, so this lookup always succeeds
            let (header, _) = self
                .resolver
                .build_header(source_mac, destination_ip, ethertype, None);
            let Ok(mut buffer) = state.pool.acquire() else {
                return Ok(self.dropped(source, DropReason::PoolExhausted, frame.len()));
            };
            buffer.load(&header, payload, ETH_ZLEN);
            buffer
        };

        // Delivered
        let len = buffer.len();
        debug!(
            %source,
            destination = %receiver.id(),
            %destination_ip,
            len,
            "frame delivered"
        );
        if self.print_packets {
            self.print_frame(source, receiver.id(), destination_ip, buffer.as_slice());
        }
        receiver.receive(buffer, self.sink);

        Ok(TransmitOutcome::Delivered {
            interface: resolution.interface,
            len,
        })
    }

    fn dropped(&self, source: InterfaceId, reason: DropReason, len: usize) -> TransmitOutcome {
        debug!(%source, %reason, len, "frame dropped");
        TransmitOutcome::Dropped(reason)
    }

    fn print_frame(&self, source: InterfaceId, destination: InterfaceId, ip: Ipv4Addr, data: &[u8]) {
        debug!(%source, %destination, %ip, "frame dump:\n{}", hex_dump(data));
    }
}

/// Sixteen space-separated hex bytes per line
pub fn hex_dump(data: &[u8]) -> String {
    data.chunks(16)
        .map(|row| {
            row.iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::sink::RxQueues;
    use crate::network::ethernet::EthernetHeader;
    use crate::network::ipv4::{protocol, Ipv4Header};

    struct Rig {
        book: AddressBook,
        interfaces: Vec<Interface>,
        rx: RxQueues,
    }

    impl Rig {
        fn new(count: usize, pool_size: usize) -> Self {
            let interfaces: Vec<Interface> = (0..count)
                .map(|i| {
                    Interface::new(
                        InterfaceId(i),
                        Ipv4Addr::new(10, 0, 0, i as u8 + 1),
                        format!("02:00:00:00:00:{:02x}", i + 1),
                        pool_size,
                    )
                })
                .collect();
            let mut book = AddressBook::with_expected(count);
            for iface in &interfaces {
                book.insert(iface.ip(), iface.id()).unwrap();
            }
            Rig {
                book,
                interfaces,
                rx: RxQueues::new(),
            }
        }

        fn open_all(&self) {
            for iface in &self.interfaces {
                iface.open().unwrap();
            }
        }

        fn engine(&self) -> ForwardingEngine<'_> {
            ForwardingEngine::new(&self.book, &self.interfaces, &self.rx, false)
        }

        fn pools(&self) -> Vec<usize> {
            self.interfaces.iter().map(Interface::pool_available).collect()
        }
    }

    fn frame_to(dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
        let ip = Ipv4Header::new_simple(protocol::UDP, Ipv4Addr::new(10, 0, 0, 1), dst, 0);
        EthernetHeader::new(MacAddress::UNSPECIFIED, MacAddress::UNSPECIFIED, ethertype::IPV4)
            .encapsulate(&ip.with_payload(payload).unwrap())
    }

    #[test]
    fn test_delivers_to_owner_of_destination() {
        let rig = Rig::new(3, 2);
        rig.open_all();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 3), &[0x5a; 64]);

        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(
            outcome,
            TransmitOutcome::Delivered {
                interface: InterfaceId(2),
                len: frame.len(),
            }
        );

        let got = rig.rx.pop(InterfaceId(2)).unwrap();
        let header = EthernetHeader::from_bytes(&got).unwrap();
        assert_eq!(header.source, MacAddress([2, 0, 0, 0, 0, 1]));
        assert_eq!(header.destination, MacAddress([2, 0, 0, 0, 0, 3]));
        assert_eq!(&got[ETH_HLEN..], &frame[ETH_HLEN..]);
        assert_eq!(rig.pools(), vec![2, 2, 2]);
    }

    #[test]
    fn test_short_routable_frame_is_padded() {
        let rig = Rig::new(2, 1);
        rig.open_all();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 2), &[0xee; 4]);
        assert_eq!(frame.len(), 38);

        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(
            outcome,
            TransmitOutcome::Delivered {
                interface: InterfaceId(1),
                len: ETH_ZLEN,
            }
        );
        let got = rig.rx.pop(InterfaceId(1)).unwrap();
        assert_eq!(got.len(), ETH_ZLEN);
        assert_eq!(&got[ETH_HLEN..38], &frame[ETH_HLEN..]);
        assert!(got[38..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_header_incomplete_frame_is_rejected() {
        let rig = Rig::new(2, 1);
        rig.open_all();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 2), &[]);
        let outcome = rig.engine().transmit(InterfaceId(0), &frame[..MIN_ROUTABLE_LEN - 1]);
        assert_eq!(outcome.unwrap(), TransmitOutcome::Dropped(DropReason::TooShort));
        assert!(rig.rx.is_empty());
    }

    #[test]
    fn test_oversized_frame_is_dropped() {
        let rig = Rig::new(2, 1);
        rig.open_all();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 2), &vec![0u8; BUFFER_CAPACITY]);
        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(outcome, TransmitOutcome::Dropped(DropReason::Oversized));
    }

    #[test]
    fn test_unknown_destination_changes_nothing() {
        let rig = Rig::new(2, 2);
        rig.open_all();
        let before = rig.pools();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 99), &[1; 32]);

        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(outcome, TransmitOutcome::Dropped(DropReason::NoRoute));
        assert_eq!(rig.pools(), before);
        assert!(rig.interfaces.iter().all(Interface::is_up));
        assert!(rig.rx.is_empty());
    }

    #[test]
    fn test_down_destination() {
        let rig = Rig::new(2, 2);
        rig.interfaces[0].open().unwrap();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 2), &[1; 32]);

        // never opened
        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(outcome, TransmitOutcome::Dropped(DropReason::InterfaceDown));

        // opened then released
        rig.interfaces[1].open().unwrap();
        rig.interfaces[1].release();
        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(outcome, TransmitOutcome::Dropped(DropReason::InterfaceDown));
        assert_eq!(rig.pools(), vec![2, 2]);
    }

    #[test]
    fn test_late_opened_destination_gets_its_address() {
        let rig = Rig::new(2, 1);
        rig.interfaces[0].open().unwrap();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 2), &[3; 32]);
        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(outcome, TransmitOutcome::Dropped(DropReason::InterfaceDown));

        // same engine, destination opened in between
        let engine = rig.engine();
        rig.interfaces[1].open().unwrap();
        assert!(engine.transmit(InterfaceId(0), &frame).unwrap().is_delivered());
        let got = rig.rx.pop(InterfaceId(1)).unwrap();
        let header = EthernetHeader::from_bytes(&got).unwrap();
        assert_eq!(header.destination, MacAddress([2, 0, 0, 0, 0, 2]));
        assert_eq!(header.source, MacAddress([2, 0, 0, 0, 0, 1]));
    }

    #[test]
    fn test_stopped_or_unknown_source_is_an_error() {
        let rig = Rig::new(2, 1);
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 2), &[1; 32]);
        assert!(matches!(
            rig.engine().transmit(InterfaceId(0), &frame),
            Err(FabricError::QueueStopped(InterfaceId(0)))
        ));
        assert!(matches!(
            rig.engine().transmit(InterfaceId(9), &frame),
            Err(FabricError::UnknownInterface(InterfaceId(9)))
        ));
    }

    #[test]
    fn test_exhausted_pool_drops() {
        let rig = Rig::new(2, 1);
        rig.open_all();
        let held = rig.interfaces[1].lock().pool.acquire().unwrap();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 2), &[1; 32]);

        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert_eq!(outcome, TransmitOutcome::Dropped(DropReason::PoolExhausted));

        rig.interfaces[1].lock().pool.release(held).unwrap();
        assert!(rig.engine().transmit(InterfaceId(0), &frame).unwrap().is_delivered());
    }

    #[test]
    fn test_frame_to_own_address_loops_back() {
        let rig = Rig::new(2, 1);
        rig.open_all();
        let frame = frame_to(Ipv4Addr::new(10, 0, 0, 1), &[1; 32]);
        let outcome = rig.engine().transmit(InterfaceId(0), &frame).unwrap();
        assert!(outcome.is_delivered());
        assert_eq!(rig.rx.len(InterfaceId(0)), 1);
    }

    #[test]
    fn test_hex_dump() {
        let data: Vec<u8> = (0..18).collect();
        let dump = hex_dump(&data);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00 01 02"));
        assert_eq!(lines[1], "10 11");
    }
}
