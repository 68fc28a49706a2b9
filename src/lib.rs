//! A software-only fabric of virtual network interfaces
//!
//! Frames handed to one interface are delivered straight into the receive
//! path of the interface that owns the destination IPv4 address. There is
//! no wire and no kernel device:
//! - Address book: open-addressing table from IPv4 address to interface
//! - Buffer pools: fixed per-interface packet buffers
//! - Forwarding: validate, resolve, enqueue, deliver or drop
//! - Delivery sinks: where received frames surface

pub mod config;
pub mod error;
pub mod iface;
pub mod logging;
pub mod network;

// Re-export commonly used types
pub use config::FabricConfig;
pub use error::{DropReason, FabricError, TransmitOutcome};
pub use iface::{
    ChannelSink, DeliverySink, Fabric, Interface, InterfaceId, OwnedFrame, ReceivedFrame, RxQueues,
};
pub use network::ethernet::{EthernetHeader, MacAddress};
pub use network::ipv4::Ipv4Header;
