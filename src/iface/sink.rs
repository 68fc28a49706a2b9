//! Consumers of inbound traffic.
//!
//! Delivery is an upcall: the forwarding engine calls [`DeliverySink::deliver`]
//! on the transmitting thread, with the destination's lock already released.
//! The sink only borrows the frame; anything it keeps must be copied out.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};

use parking_lot::Mutex;

use super::InterfaceId;

/// A frame as surfaced by an interface's receive path
#[derive(Debug, Clone, Copy)]
pub struct ReceivedFrame<'a> {
    pub interface: InterfaceId,
    pub ethertype: u16,
    /// Complete frame, link-layer header included
    pub data: &'a [u8],
}

/// Whatever consumes inbound traffic for the fabric's interfaces
pub trait DeliverySink: Send + Sync {
    fn deliver(&self, frame: ReceivedFrame<'_>);
}

/// Per-interface FIFO of received frames
#[derive(Debug, Default)]
pub struct RxQueues {
    queues: Mutex<HashMap<InterfaceId, VecDeque<Vec<u8>>>>,
}

impl RxQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest frame received on `interface`
    pub fn pop(&self, interface: InterfaceId) -> Option<Vec<u8>> {
        self.queues.lock().get_mut(&interface)?.pop_front()
    }

    /// Frames waiting on `interface`
    pub fn len(&self, interface: InterfaceId) -> usize {
        self.queues.lock().get(&interface).map_or(0, VecDeque::len)
    }

    pub fn total(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl DeliverySink for RxQueues {
    fn deliver(&self, frame: ReceivedFrame<'_>) {
        self.queues
            .lock()
            .entry(frame.interface)
            .or_default()
            .push_back(frame.data.to_vec());
    }
}

/// Frame copied off the fabric by a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub interface: InterfaceId,
    pub ethertype: u16,
    pub data: Vec<u8>,
}

/// Hands frames to a consumer thread over a channel
///
/// Delivery still completes synchronously; the channel only moves the
/// consuming work off the transmitting thread.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Mutex<Sender<OwnedFrame>>,
}

impl ChannelSink {
    pub fn channel() -> (Self, Receiver<OwnedFrame>) {
        let (sender, receiver) = mpsc::channel();
        (
            ChannelSink {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }
}

impl DeliverySink for ChannelSink {
    fn deliver(&self, frame: ReceivedFrame<'_>) {
        let owned = OwnedFrame {
            interface: frame.interface,
            ethertype: frame.ethertype,
            data: frame.data.to_vec(),
        };
        if self.sender.lock().send(owned).is_err() {
            tracing::debug!(iface = %frame.interface, "receiver gone, frame discarded");
        }
    }
}
