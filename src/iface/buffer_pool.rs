//! Per-interface pool of fixed-capacity packet buffers.
//!
//! The pool is an index arena: a fixed array of slots plus a stack of free
//! slot indices. A [`PacketBuffer`] taken out with [`BufferPool::acquire`] is
//! owned by value until it is handed back with [`BufferPool::release`], so a
//! buffer can never be in the pool and in flight at the same time.

use crate::network::ethernet::{EthernetHeader, ETH_FRAME_LEN, ETH_HLEN};

use super::InterfaceId;

/// Bytes of frame data a buffer can hold (link-layer header included).
pub const BUFFER_CAPACITY: usize = ETH_FRAME_LEN;

/// Default number of buffers per interface.
pub const DEFAULT_POOL_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("buffer pool exhausted")]
    Exhausted,
    #[error("buffer belongs to {owner}, not {pool}")]
    ForeignBuffer { owner: InterfaceId, pool: InterfaceId },
    #[error("slot {0} is already occupied")]
    SlotOccupied(usize),
    #[error("slot {0} does not exist in this pool")]
    UnknownSlot(usize),
}

/// A frame-sized buffer borrowed from an interface's pool.
pub struct PacketBuffer {
    owner: InterfaceId,
    slot: usize,
    len: usize,
    data: Box<[u8; BUFFER_CAPACITY]>,
}

impl PacketBuffer {
    fn new(owner: InterfaceId, slot: usize) -> Self {
        PacketBuffer {
            owner,
            slot,
            len: 0,
            data: Box::new([0u8; BUFFER_CAPACITY]),
        }
    }

    pub fn owner(&self) -> InterfaceId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid frame bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn header(&self) -> Option<EthernetHeader> {
        EthernetHeader::from_bytes(self.as_slice())
    }

    /// Write `header` followed by `payload`, zero padded up to `min_len`.
    ///
    /// Bytes past the payload are cleared explicitly since the buffer may
    /// still hold an earlier frame. Data beyond the buffer capacity is cut.
    /// Returns the resulting frame length.
    pub fn load(&mut self, header: &EthernetHeader, payload: &[u8], min_len: usize) -> usize {
        let payload_len = payload.len().min(BUFFER_CAPACITY - ETH_HLEN);
        let end = ETH_HLEN + payload_len;
        header.write(&mut self.data[..ETH_HLEN]);
        self.data[ETH_HLEN..end].copy_from_slice(&payload[..payload_len]);

        let padded = end.max(min_len).min(BUFFER_CAPACITY);
        self.data[end..padded].fill(0);
        self.len = padded;
        padded
    }
}

impl std::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("owner", &self.owner)
            .field("slot", &self.slot)
            .field("len", &self.len)
            .finish()
    }
}

#[derive(Debug)]
pub struct BufferPool {
    owner: InterfaceId,
    slots: Vec<Option<PacketBuffer>>,
    free: Vec<usize>,
}

impl BufferPool {
    /// Allocate `size` buffers up front for `owner`.
    pub fn new(owner: InterfaceId, size: usize) -> Self {
        BufferPool {
            owner,
            slots: (0..size).map(|slot| Some(PacketBuffer::new(owner, slot))).collect(),
            // lowest slot on top of the stack
            free: (0..size).rev().collect(),
        }
    }

    pub fn owner(&self) -> InterfaceId {
        self.owner
    }

    /// Number of buffers the pool was built with (zero once drained).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Buffers currently available to [`BufferPool::acquire`].
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Buffers currently handed out.
    pub fn in_flight(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Take a buffer off the free stack.
    pub fn acquire(&mut self) -> Result<PacketBuffer, PoolError> {
        let slot = self.free.pop().ok_or(PoolError::Exhausted)?;
        match self.slots[slot].take() {
            Some(buffer) => Ok(buffer),
            None => {
                // free stack and slots disagree; never hand out the slot
                tracing::error!(pool = %self.owner, slot, "free slot holds no buffer");
                Err(PoolError::UnknownSlot(slot))
            }
        }
    }

    /// Return a buffer to the pool.
    ///
    /// A rejected buffer is dropped, never stored twice.
    pub fn release(&mut self, mut buffer: PacketBuffer) -> Result<(), PoolError> {
        if buffer.owner != self.owner {
            return Err(PoolError::ForeignBuffer {
                owner: buffer.owner,
                pool: self.owner,
            });
        }
        let slot = buffer.slot;
        let entry = self.slots.get_mut(slot).ok_or(PoolError::UnknownSlot(slot))?;
        if entry.is_some() {
            return Err(PoolError::SlotOccupied(slot));
        }

        buffer.len = 0;
        *entry = Some(buffer);
        self.free.push(slot);
        Ok(())
    }

    /// Free every buffer. Safe to call more than once.
    pub fn drain(&mut self) {
        let outstanding = self.in_flight();
        if outstanding > 0 {
            tracing::warn!(pool = %self.owner, outstanding, "draining pool with buffers in flight");
        }
        self.slots.clear();
        self.free.clear();
    }
}
