//! The fabric: every interface plus the address book that connects them.
//!
//! A fabric is built in one go from a [`FabricConfig`]. Interface count,
//! address book size and pool sizes are fixed from then on; the only state
//! that changes afterwards is each interface's up/down flag and pool
//! occupancy. Transmits go through `&self` and may come from any number of
//! threads. Teardown needs `&mut self`, so it can never overlap a transmit.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::FabricConfig;
use crate::error::{FabricError, TransmitOutcome};
use crate::iface::address_book::AddressBook;
use crate::iface::forwarding::ForwardingEngine;
use crate::iface::interface::Interface;
use crate::iface::sink::DeliverySink;
use crate::iface::InterfaceId;
use crate::network::ethernet::MacAddress;

pub struct Fabric {
    interfaces: Vec<Interface>,
    book: AddressBook,
    sink: Arc<dyn DeliverySink>,
    print_packets: bool,
    destroyed: bool,
}

impl Fabric {
    /// Build a fabric with every interface down and every pool full
    pub fn create(config: &FabricConfig, sink: Arc<dyn DeliverySink>) -> Result<Self, FabricError> {
        config.validate()?;

        let ips = config
            .ip_addresses
            .iter()
            .enumerate()
            .map(|(i, ip)| {
                ip.trim().parse::<Ipv4Addr>().map_err(|e| {
                    FabricError::MalformedAddressConfig(format!(
                        "{}: IP address {ip:?}: {e}",
                        InterfaceId(i)
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let interfaces: Vec<Interface> = ips
            .into_iter()
            .zip(&config.mac_addresses)
            .enumerate()
            .map(|(i, (ip, mac))| Interface::new(InterfaceId(i), ip, mac.as_str(), config.pool_size))
            .collect();

        let mut fabric = Fabric {
            book: AddressBook::with_expected(interfaces.len()),
            interfaces,
            sink,
            print_packets: config.print_packets,
            destroyed: false,
        };
        if let Err(e) = fabric.populate() {
            fabric.destroy();
            return Err(e);
        }

        info!(
            interfaces = fabric.interfaces.len(),
            table_capacity = fabric.book.capacity(),
            pool_size = config.pool_size,
            "fabric created"
        );
        Ok(fabric)
    }

    fn populate(&mut self) -> Result<(), FabricError> {
        for iface in &self.interfaces {
            let ip = iface.ip();
            self.book
                .insert(ip, iface.id())
                .map_err(|source| FabricError::InsertionFailure { ip, source })?;
            debug!(iface = %iface.name(), %ip, "address registered");
        }
        Ok(())
    }

    /// Tear everything down: pools drained, table cleared, interfaces gone.
    ///
    /// Runs at most once; later calls (and the one from `Drop`) do nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        for iface in &self.interfaces {
            iface.teardown();
        }
        self.book.clear();
        let count = self.interfaces.len();
        self.interfaces.clear();
        info!(interfaces = count, "fabric destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn open(&self, id: InterfaceId) -> Result<MacAddress, FabricError> {
        self.require(id)?.open()
    }

    pub fn release(&self, id: InterfaceId) -> Result<(), FabricError> {
        self.require(id)?.release();
        Ok(())
    }

    /// Open every interface, returning the ones that failed
    ///
    /// A failure only affects its own interface.
    pub fn open_all(&self) -> Vec<(InterfaceId, FabricError)> {
        self.interfaces
            .iter()
            .filter_map(|iface| iface.open().err().map(|e| (iface.id(), e)))
            .collect()
    }

    /// Send `frame` out of `source`. See [`ForwardingEngine::transmit`].
    pub fn transmit(&self, source: InterfaceId, frame: &[u8]) -> Result<TransmitOutcome, FabricError> {
        ForwardingEngine::new(&self.book, &self.interfaces, self.sink.as_ref(), self.print_packets)
            .transmit(source, frame)
    }

    pub fn interface(&self, id: InterfaceId) -> Option<&Interface> {
        self.interfaces.get(id.index())
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// Interface owning `ip`
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&Interface> {
        self.book.lookup(ip).and_then(|id| self.interface(id))
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.book
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    fn require(&self, id: InterfaceId) -> Result<&Interface, FabricError> {
        self.interface(id).ok_or(FabricError::UnknownInterface(id))
    }
}

impl Drop for Fabric {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Fabric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fabric")
            .field("interfaces", &self.interfaces)
            .field("book", &self.book)
            .field("print_packets", &self.print_packets)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::address_book::InsertError;
    use crate::iface::sink::RxQueues;

    fn config() -> FabricConfig {
        FabricConfig::new(
            ["10.0.0.1", "10.0.0.2", "10.0.0.3"],
            ["02:00:00:00:00:01", "02:00:00:00:00:02", "02:00:00:00:00:03"],
        )
        .with_pool_size(4)
    }

    fn fabric() -> Fabric {
        Fabric::create(&config(), Arc::new(RxQueues::new())).unwrap()
    }

    #[test]
    fn test_create() {
        let fabric = fabric();
        assert_eq!(fabric.len(), 3);
        assert!(!fabric.is_destroyed());
        assert_eq!(fabric.address_book().len(), 3);
        assert_eq!(fabric.address_book().capacity(), 8);
        for (i, iface) in fabric.interfaces().iter().enumerate() {
            assert_eq!(iface.id(), InterfaceId(i));
            assert!(!iface.is_up());
            assert_eq!(iface.pool_available(), 4);
        }
    }

    #[test]
    fn test_every_interface_has_its_table_entry() {
        let fabric = fabric();
        for iface in fabric.interfaces() {
            let found = fabric.lookup(iface.ip()).unwrap();
            assert_eq!(found.id(), iface.id());
        }
        assert!(fabric.lookup(Ipv4Addr::new(10, 0, 0, 99)).is_none());
    }

    #[test]
    fn test_create_rejects_bad_ip() {
        let mut config = config();
        config.ip_addresses[1] = "10.0.0.256".into();
        let err = Fabric::create(&config, Arc::new(RxQueues::new())).unwrap_err();
        assert!(matches!(err, FabricError::MalformedAddressConfig(_)));
        assert!(err.to_string().contains("vnic1"));
    }

    #[test]
    fn test_create_rejects_duplicate_ip() {
        let mut config = config();
        config.ip_addresses[2] = "10.0.0.1".into();
        let err = Fabric::create(&config, Arc::new(RxQueues::new())).unwrap_err();
        assert!(matches!(
            err,
            FabricError::InsertionFailure {
                source: InsertError::Duplicate,
                ..
            }
        ));
    }

    #[test]
    fn test_open_release_unknown() {
        let fabric = fabric();
        assert!(matches!(
            fabric.open(InterfaceId(3)),
            Err(FabricError::UnknownInterface(InterfaceId(3)))
        ));
        assert!(fabric.release(InterfaceId(3)).is_err());

        let mac = fabric.open(InterfaceId(2)).unwrap();
        assert_eq!(mac, MacAddress([2, 0, 0, 0, 0, 3]));
        fabric.release(InterfaceId(2)).unwrap();
        assert!(!fabric.interface(InterfaceId(2)).unwrap().is_up());
    }

    #[test]
    fn test_open_all_reports_only_failures() {
        let mut config = config();
        config.mac_addresses[1] = "02:00:00:00:00:zz".into();
        let fabric = Fabric::create(&config, Arc::new(RxQueues::new())).unwrap();

        let failures = fabric.open_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, InterfaceId(1));
        assert!(matches!(failures[0].1, FabricError::MalformedAddressConfig(_)));

        let up: Vec<bool> = fabric.interfaces().iter().map(Interface::is_up).collect();
        assert_eq!(up, vec![true, false, true]);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut fabric = fabric();
        fabric.open_all();
        fabric.destroy();
        assert!(fabric.is_destroyed());
        assert!(fabric.is_empty());
        assert!(fabric.address_book().is_empty());
        fabric.destroy();

        let frame = [0u8; 64];
        assert!(matches!(
            fabric.transmit(InterfaceId(0), &frame),
            Err(FabricError::UnknownInterface(_))
        ));
    }

    #[test]
    fn test_fabric_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fabric>();
    }
}
