//! Host-side command ring.
//!
//! A shared-memory region cooperating host processes read directly; the
//! device fills it from the output buffers and wakes readers through the
//! named semaphores. The fill cursor (`host_data_buffer_offset`) lives in
//! `SharedParams` because the ingress notifier can reset it asynchronously.

use crate::registers::RegisterFile;
use crate::shm::SharedRegion;

/// The shared command ring.
pub struct HostRing {
    region: SharedRegion,
}

impl HostRing {
    pub fn new(region: SharedRegion) -> Self {
        Self { region }
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.region.size()
    }

    /// Copy `bytes` into the ring at `offset`, clipped to capacity.
    ///
    /// Returns the number of bytes actually copied.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> usize {
        let slice = self.region.as_mut_slice();
        let free = slice.len().saturating_sub(offset);
        let n = bytes.len().min(free);
        slice[offset..offset + n].copy_from_slice(&bytes[..n]);
        n
    }

    /// The ring contents, for readers and tests.
    pub fn as_slice(&self) -> &[u8] {
        self.region.as_slice()
    }
}

/// Drain pending output transactions into the ring.
///
/// While the ring has free space and an output buffer is current, copy the
/// current buffer's remaining bytes in and advance both cursors. A buffer
/// that empties is reset, its EMPTY status bit is set, and `current` hands
/// over to the other buffer if that one still has a transaction, otherwise
/// the direction goes idle. The caller updates the IRQ line afterwards.
///
/// Returns the total number of bytes moved.
pub fn drain_output(regs: &mut RegisterFile, ring: &mut HostRing, cursor: &mut u32) -> usize {
    let mut moved = 0;
    while regs.current_output_buffer != 0 {
        let n = regs.current_output_buffer;
        let buf = &mut regs.output_buffers[(n - 1) as usize];

        if buf.available() > 0 {
            let copied = ring.write_at(*cursor as usize, buf.pending());
            if copied == 0 {
                break; // ring full
            }
            buf.advance(copied);
            *cursor += copied as u32;
            moved += copied;
        }

        if buf.available() == 0 {
            buf.reset();
            regs.int_status.insert(RegisterFile::output_empty_flag(n));
            regs.rotate_output();
        }
    }
    moved
}
