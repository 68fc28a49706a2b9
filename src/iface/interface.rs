//! Virtual network interface
//!
//! An interface is one endpoint of the fabric:
//! - identity: index, name, configured IPv4 and MAC address
//! - administrative state (up/down), which gates its transmit queue
//! - a private pool of packet buffers for frames delivered to it
//!
//! The administrative state and the pool live behind a single lock. The
//! forwarding engine takes that lock while delivering into the interface;
//! an interface never looks at any other interface.

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::FabricError;
use crate::iface::buffer_pool::{BufferPool, PacketBuffer};
use crate::iface::sink::{DeliverySink, ReceivedFrame};
use crate::iface::InterfaceId;
use crate::network::ethernet::{peek_ethertype, MacAddress};

/// State guarded by the interface lock
#[derive(Debug)]
pub struct InterfaceState {
    pub admin_up: bool,
    pub pool: BufferPool,
}

/// A virtual network interface
#[derive(Debug)]
pub struct Interface {
    id: InterfaceId,
    name: String,
    ip: Ipv4Addr,
    /// MAC address as configured, parsed on open
    mac_config: String,
    hw_addr: OnceLock<MacAddress>,
    state: Mutex<InterfaceState>,
}

impl Interface {
    /// Create an administratively down interface with a full buffer pool
    pub fn new(id: InterfaceId, ip: Ipv4Addr, mac_config: impl Into<String>, pool_size: usize) -> Self {
        Interface {
            id,
            name: id.to_string(),
            ip,
            mac_config: mac_config.into(),
            hw_addr: OnceLock::new(),
            state: Mutex::new(InterfaceState {
                admin_up: false,
                pool: BufferPool::new(id, pool_size),
            }),
        }
    }

    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn mac_config(&self) -> &str {
        &self.mac_config
    }

    /// Link-layer address, known once the interface has been opened
    pub fn hw_addr(&self) -> Option<MacAddress> {
        self.hw_addr.get().copied()
    }

    pub fn is_up(&self) -> bool {
        self.state.lock().admin_up
    }

    /// Free buffers in this interface's pool
    pub fn pool_available(&self) -> usize {
        self.state.lock().pool.available()
    }

    /// Bring the interface up
    ///
    /// Resolves the configured MAC string into its binary form and enables
    /// the transmit queue. A malformed MAC leaves the interface down.
    pub fn open(&self) -> Result<MacAddress, FabricError> {
        let mac = match self.hw_addr.get() {
            Some(mac) => *mac,
            None => {
                let mac = self.mac_config.parse::<MacAddress>().map_err(|e| {
                    warn!(iface = %self.name, mac = %self.mac_config, error = %e, "bad MAC address");
                    FabricError::MalformedAddressConfig(format!(
                        "{}: MAC address {:?}: {}",
                        self.name, self.mac_config, e
                    ))
                })?;
                *self.hw_addr.get_or_init(|| mac)
            }
        };

        self.state.lock().admin_up = true;
        info!(iface = %self.name, ip = %self.ip, %mac, "interface up");
        Ok(mac)
    }

    /// Take the interface down and stop its transmit queue
    pub fn release(&self) {
        let mut state = self.state.lock();
        if state.admin_up {
            state.admin_up = false;
            info!(iface = %self.name, "interface down");
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, InterfaceState> {
        self.state.lock()
    }

    /// Receive path: surface a delivered frame, then recycle its buffer
    ///
    /// Called without the interface lock held. The sink only borrows the
    /// frame, so the buffer goes back to the pool once it returns, or while
    /// unwinding if it panics.
    pub(crate) fn receive(&self, buffer: PacketBuffer, sink: &dyn DeliverySink) {
        let held = Recycle {
            owner: self,
            buffer: Some(buffer),
        };
        let Some(buffer) = held.buffer.as_ref() else {
            return;
        };
        let data = buffer.as_slice();
        let frame = ReceivedFrame {
            interface: self.id,
            ethertype: peek_ethertype(data).unwrap_or_default(),
            data,
        };
        sink.deliver(frame);
        debug!(iface = %self.name, len = buffer.len(), "frame received");
    }

    /// Drop every pooled buffer; the interface stays down afterwards
    pub(crate) fn teardown(&self) {
        let mut state = self.state.lock();
        state.admin_up = false;
        state.pool.drain();
    }
}

/// Returns a buffer to its interface's pool when dropped
struct Recycle<'a> {
    owner: &'a Interface,
    buffer: Option<PacketBuffer>,
}

impl Drop for Recycle<'_> {
    fn drop(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        if let Err(e) = self.owner.state.lock().pool.release(buffer) {
            warn!(iface = %self.owner.name, error = %e, "buffer not returned to pool");
        }
    }
}
