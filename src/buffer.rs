//! Per-connection byte buffers.
//!
//! Each connection owns one input and one output `Buffer`. Growth is
//! geometric with a 512-byte floor and uses fallible reservation so an
//! allocation failure degrades into an error response instead of an abort.
//! The unsent/unparsed prefix always starts at offset 0; `consume` compacts
//! the tail down after partial progress.

/// A growable byte buffer with an explicit fill cursor.
///
/// `data.len()` is the buffer's size; `used` is how much of it holds live
/// bytes. The region `data[used..]` is writable headroom.
#[derive(Debug, Default)]
pub(crate) struct Buffer {
    data: Vec<u8>,
    used: usize,
    failed: bool,
}

/// Minimum headroom kept available for the next read.
pub(crate) const READ_HEADROOM: usize = 128;

/// Initial allocation size when a buffer first grows.
const INITIAL_SIZE: usize = 512;

impl Buffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Live bytes currently in the buffer.
    pub(crate) fn used(&self) -> usize {
        self.used
    }

    /// The live prefix.
    pub(crate) fn filled(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// Writable headroom after the live prefix.
    pub(crate) fn spare(&mut self) -> &mut [u8] {
        &mut self.data[self.used..]
    }

    /// Record `n` freshly written bytes at the end of the live prefix.
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(self.used + n <= self.data.len());
        self.used += n;
    }

    /// Whether an append has ever failed on this buffer.
    pub(crate) fn has_failed(&self) -> bool {
        self.failed
    }

    /// Ensure at least `READ_HEADROOM` bytes of headroom, doubling the size
    /// (floor 512). Returns `false` if the allocation failed.
    pub(crate) fn reserve_read_headroom(&mut self) -> bool {
        if self.data.len() - self.used >= READ_HEADROOM {
            return true;
        }
        let new_size = if self.data.is_empty() {
            INITIAL_SIZE
        } else {
            2 * self.data.len()
        };
        self.grow_to(new_size)
    }

    /// Append bytes to the live prefix, growing as needed.
    ///
    /// Once an append fails, the buffer is poisoned and every later append
    /// is a no-op; the caller checks `has_failed` at flush time.
    pub(crate) fn append(&mut self, bytes: &[u8]) {
        if self.failed || bytes.is_empty() {
            return;
        }
        if self.data.len() - self.used < bytes.len() {
            let new_size = (2 * self.data.len()).max(self.used + bytes.len());
            if !self.grow_to(new_size) {
                self.failed = true;
                return;
            }
        }
        self.data[self.used..self.used + bytes.len()].copy_from_slice(bytes);
        self.used += bytes.len();
    }

    /// Drop the first `n` live bytes, sliding the remainder to offset 0.
    pub(crate) fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.used);
        self.data.copy_within(n..self.used, 0);
        self.used -= n;
    }

    fn grow_to(&mut self, new_size: usize) -> bool {
        if new_size <= self.data.len() {
            return true;
        }
        if self
            .data
            .try_reserve_exact(new_size - self.data.len())
            .is_err()
        {
            return false;
        }
        self.data.resize(new_size, 0);
        true
    }
}
