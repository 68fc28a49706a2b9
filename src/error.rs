//! Error and outcome types for the fabric.
//!
//! Setup-time failures are [`FabricError`]s and abort construction. Per-packet
//! failures never surface as errors: they are reported as
//! [`TransmitOutcome::Dropped`] with a [`DropReason`].

use std::fmt;
use std::net::Ipv4Addr;

use crate::iface::address_book::InsertError;
use crate::iface::InterfaceId;

/// Errors that can occur while building or driving a fabric.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("malformed address configuration: {0}")]
    MalformedAddressConfig(String),
    #[error("address table insertion failed for {ip}: {source}")]
    InsertionFailure {
        ip: Ipv4Addr,
        #[source]
        source: InsertError,
    },
    #[error("unknown interface {0}")]
    UnknownInterface(InterfaceId),
    #[error("transmit queue of {0} is stopped")]
    QueueStopped(InterfaceId),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a frame was dropped instead of delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Too short to hold the link-layer and network-layer headers.
    TooShort,
    /// Larger than a packet buffer.
    Oversized,
    /// No interface owns the destination address.
    NoRoute,
    /// The destination interface is administratively down.
    InterfaceDown,
    /// The destination interface has no free packet buffer.
    PoolExhausted,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DropReason::TooShort => "frame too short",
            DropReason::Oversized => "frame too long",
            DropReason::NoRoute => "no route to destination",
            DropReason::InterfaceDown => "destination interface down",
            DropReason::PoolExhausted => "destination buffer pool exhausted",
        };
        f.write_str(reason)
    }
}

/// Result of a single transmit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitOutcome {
    /// Delivered to `interface` as a frame of `len` bytes (after padding).
    Delivered { interface: InterfaceId, len: usize },
    Dropped(DropReason),
}

impl TransmitOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, TransmitOutcome::Delivered { .. })
    }

    #[must_use]
    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            TransmitOutcome::Dropped(reason) => Some(*reason),
            TransmitOutcome::Delivered { .. } => None,
        }
    }
}
