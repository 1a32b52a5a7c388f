//! Directional DMA buffers.
//!
//! Each buffer pairs a guest physical address with a host backing store and
//! a `[offset, transfer_len)` cursor window. The backing store grows on
//! demand when a transaction exceeds the current capacity; growth does not
//! preserve prior contents because `set_length` always precedes fresh I/O.

use glbridge_hostapi::GuestBus;

/// One directional DMA buffer.
///
/// Invariant after every operation: `offset <= transfer_len <= capacity`.
#[derive(Debug, Clone, Default)]
pub struct DmaBuffer {
    tag: [u8; 4],
    guest_addr: u32,
    data: Vec<u8>,
    transfer_len: usize,
    offset: usize,
}

impl DmaBuffer {
    /// Create an empty buffer stamped with the ASCII digit of `number`.
    pub fn new(number: u32) -> Self {
        let mut tag = *b"BUFx";
        tag[3] = b'0' + (number % 10) as u8;
        Self {
            tag,
            ..Self::default()
        }
    }

    /// Replace the backing store with an externally-provided one.
    ///
    /// Clears the cursors; capacity becomes the backing's length.
    pub fn set_backing(&mut self, backing: Vec<u8>) {
        self.data = backing;
        self.transfer_len = 0;
        self.offset = 0;
    }

    /// Clear the cursors without releasing storage.
    pub fn reset(&mut self) {
        self.offset = 0;
        self.transfer_len = 0;
    }

    /// Begin a transaction of `len` bytes, growing the store if needed.
    pub fn set_length(&mut self, len: usize) {
        if len > self.data.len() {
            self.data = vec![0; len];
        }
        self.transfer_len = len;
        self.offset = 0;
    }

    /// Pull the transaction bytes out of guest memory.
    pub fn read_from_guest(&mut self, bus: &mut dyn GuestBus) {
        let len = self.transfer_len;
        bus.read_physical(self.guest_addr, &mut self.data[..len]);
    }

    /// Push the transaction bytes into guest memory.
    pub fn write_to_guest(&self, bus: &mut dyn GuestBus) {
        bus.write_physical(self.guest_addr, &self.data[..self.transfer_len]);
    }

    /// Bytes of the current transaction not yet consumed.
    pub fn available(&self) -> usize {
        self.transfer_len - self.offset
    }

    /// Length of the current transaction.
    pub fn len(&self) -> usize {
        self.transfer_len
    }

    /// True when no transaction is in flight.
    pub fn is_empty(&self) -> bool {
        self.transfer_len == 0
    }

    /// Capacity of the host backing store.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The whole transaction window.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.transfer_len]
    }

    /// The not-yet-consumed tail of the transaction window.
    pub fn pending(&self) -> &[u8] {
        &self.data[self.offset..self.transfer_len]
    }

    /// Consume `n` bytes of the transaction, clamped to what is available.
    pub fn advance(&mut self, n: usize) {
        self.offset += n.min(self.available());
    }

    /// Bind the guest physical address for subsequent transfers.
    pub fn set_guest_addr(&mut self, addr: u32) {
        self.guest_addr = addr;
    }

    /// The bound guest physical address.
    pub fn guest_addr(&self) -> u32 {
        self.guest_addr
    }

    /// Debug tag, e.g. `b"BUF1"`.
    pub fn tag(&self) -> &[u8; 4] {
        &self.tag
    }
}
