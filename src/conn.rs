//! Connection slots and the fixed-capacity pool.
//!
//! Each accepted socket occupies one `Conn` slot holding its buffers and
//! framing state. Slots live in a `ConnPool`, a capacity-checked slab whose
//! index doubles as the connection's poll token.

use crate::buffer::Buffer;
use mio::net::TcpStream;
use slab::Slab;

/// Per-connection state.
#[derive(Debug)]
pub(crate) struct Conn {
    /// The nonblocking client socket.
    pub(crate) stream: TcpStream,
    /// Bytes received and not yet consumed.
    pub(crate) input: Buffer,
    /// Serialized response bytes not yet flushed to the kernel.
    pub(crate) output: Buffer,
    /// A complete head has been framed; `body_offset`/`body_length` are valid.
    pub(crate) head_received: bool,
    /// Offset of the body within the input buffer.
    pub(crate) body_offset: usize,
    /// Body length announced by the head.
    pub(crate) body_length: usize,
    /// Requests served on this connection.
    pub(crate) served: u32,
    /// Close the socket once the output buffer drains. Monotonic for the
    /// lifetime of the slot.
    pub(crate) close_when_drained: bool,
}

impl Conn {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            input: Buffer::new(),
            output: Buffer::new(),
            head_received: false,
            body_offset: 0,
            body_length: 0,
            served: 0,
            close_when_drained: false,
        }
    }
}

/// Fixed-capacity pool of connection slots.
///
/// Slab keeps freed indices on an internal free list, so `live + free`
/// always equals the configured capacity and slot lookup is O(1).
pub(crate) struct ConnPool {
    slots: Slab<Conn>,
    capacity: usize,
}

impl ConnPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Slab::with_capacity(capacity),
            capacity,
        }
    }

    /// Admit a connection. Returns `None` when the pool is full.
    pub(crate) fn insert(&mut self, conn: Conn) -> Option<usize> {
        if self.slots.len() >= self.capacity {
            return None;
        }
        Some(self.slots.insert(conn))
    }

    pub(crate) fn get_mut(&mut self, id: usize) -> Option<&mut Conn> {
        self.slots.get_mut(id)
    }

    /// Release a slot, returning the connection so the caller can
    /// deregister and drop the socket.
    pub(crate) fn remove(&mut self, id: usize) -> Option<Conn> {
        if self.slots.contains(id) {
            Some(self.slots.remove(id))
        } else {
            None
        }
    }

    pub(crate) fn contains(&self, id: usize) -> bool {
        self.slots.contains(id)
    }

    /// Number of active connections.
    pub(crate) fn live(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drain every active slot, used at shutdown.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Conn> + '_ {
        self.slots.drain()
    }
}
