//! Virtual interface layer
//!
//! This module provides the pieces of the fabric:
//! - Address book mapping IPv4 addresses to interfaces
//! - Per-interface buffer pools
//! - Interfaces and their receive path
//! - Destination resolution and the forwarding engine
//! - The fabric that owns all of the above

use std::fmt;

pub mod address_book;
pub mod buffer_pool;
pub mod fabric;
pub mod forwarding;
pub mod interface;
pub mod resolver;
pub mod sink;

pub use address_book::{AddressBook, InsertError};
pub use buffer_pool::{BufferPool, PacketBuffer, PoolError, BUFFER_CAPACITY, DEFAULT_POOL_SIZE};
pub use fabric::Fabric;
pub use forwarding::{ForwardingEngine, MIN_ROUTABLE_LEN};
pub use interface::Interface;
pub use resolver::{HeaderResolver, Resolution};
pub use sink::{ChannelSink, DeliverySink, OwnedFrame, ReceivedFrame, RxQueues};

/// Position of an interface in its fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(pub usize);

impl InterfaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vnic{}", self.0)
    }
}
