//! The guest-visible register file.
//!
//! `RegisterFile` holds everything the register-window state machine reads
//! and writes on the emulator thread. The handful of fields the ingress
//! notifier may touch live separately in `SharedParams` behind the
//! parameters mutex; all other fields need no locking because the emulator
//! serializes MMIO callbacks.

use glbridge_primitives::IntFlags;

use crate::buffer::DmaBuffer;

/// Fields shared with the ingress notifier, guarded by the parameters mutex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedParams {
    /// Command code of the last signalled barrier.
    pub signal_type: u32,
    /// Value carried by the last signalled barrier.
    pub signal_value: u32,
    /// Fill cursor into the host command ring.
    pub host_data_buffer_offset: u32,
}

/// Register state of one device instance.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    pub int_status: IntFlags,
    pub int_enable: IntFlags,
    pub region_write_done: u32,
    pub sync_value: u32,
    /// 0 = idle, 1 or 2 = the output buffer currently draining.
    pub current_output_buffer: u32,
    /// 0 = idle, 1 or 2 = the input buffer currently filling.
    pub current_input_buffer: u32,
    pub input_buffer_1_available_count: u32,
    pub input_buffer_2_available_count: u32,
    pub output_buffers: [DmaBuffer; 2],
    pub input_buffers: [DmaBuffer; 2],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            output_buffers: [DmaBuffer::new(1), DmaBuffer::new(2)],
            input_buffers: [DmaBuffer::new(1), DmaBuffer::new(2)],
            ..Self::default()
        }
    }

    /// Status visible to the guest: enabled bits only.
    pub fn masked_status(&self) -> u32 {
        (self.int_status & self.int_enable).bits()
    }

    /// Level the IRQ line must carry right now.
    pub fn irq_pending(&self) -> bool {
        !(self.int_status & self.int_enable).is_empty()
    }

    /// `INITIALISE`: reset the buffers and program the enable mask.
    ///
    /// Both output buffers report empty afterwards so the guest can start
    /// filling immediately.
    pub fn initialise(&mut self, enable_mask: u32) {
        for buf in self.output_buffers.iter_mut().chain(self.input_buffers.iter_mut()) {
            buf.reset();
        }
        self.current_output_buffer = 0;
        self.current_input_buffer = 0;
        self.int_enable = IntFlags::from_bits_retain(enable_mask);
        self.int_status = IntFlags::OUTPUT_BUFFER_1_EMPTY | IntFlags::OUTPUT_BUFFER_2_EMPTY;
    }

    /// `START_INPUT`: arm both input buffers for a transfer of `count` bytes.
    pub fn arm_input(&mut self, count: u32) {
        if self.current_input_buffer == 0 {
            self.current_input_buffer = 1;
        }
        for buf in self.input_buffers.iter_mut() {
            buf.set_length(count as usize);
        }
        self.input_buffer_1_available_count = count;
        self.input_buffer_2_available_count = count;
        self.int_status.remove(IntFlags::INPUT_BUFFER_1_FULL);
    }

    /// Full reset used on guest reboot.
    pub fn reset_buffers(&mut self) {
        for buf in self.output_buffers.iter_mut().chain(self.input_buffers.iter_mut()) {
            buf.reset();
        }
        self.current_output_buffer = 0;
        self.current_input_buffer = 0;
        self.input_buffer_1_available_count = 0;
        self.input_buffer_2_available_count = 0;
    }

    /// The EMPTY status bit of output buffer `n` (1-based).
    pub fn output_empty_flag(n: u32) -> IntFlags {
        if n == 1 {
            IntFlags::OUTPUT_BUFFER_1_EMPTY
        } else {
            IntFlags::OUTPUT_BUFFER_2_EMPTY
        }
    }

    /// Hand `current_output_buffer` on after the current buffer drained.
    ///
    /// The successor is the other buffer iff it still has a transaction in
    /// flight; otherwise the direction goes idle. The drained buffer must
    /// already be reset so its `len()` reads zero.
    pub fn rotate_output(&mut self) {
        self.current_output_buffer =
            rotate(self.current_output_buffer, &self.output_buffers);
    }

    /// Symmetric rotation for the input direction.
    pub fn rotate_input(&mut self) {
        self.current_input_buffer = rotate(self.current_input_buffer, &self.input_buffers);
    }
}

/// Successor of `current` given the pair's transaction lengths.
fn rotate(current: u32, buffers: &[DmaBuffer; 2]) -> u32 {
    match current {
        1 | 2 => {
            let other = 3 - current;
            if buffers[(other - 1) as usize].len() > 0 {
                other
            } else {
                0
            }
        }
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialise_programs_masks() {
        let mut regs = RegisterFile::new();
        regs.output_buffers[0].set_length(8);
        regs.current_output_buffer = 1;

        regs.initialise(3);

        assert_eq!(regs.int_enable.bits(), 3);
        assert_eq!(regs.masked_status(), 3);
        assert!(regs.irq_pending());
        assert_eq!(regs.current_output_buffer, 0);
        assert_eq!(regs.current_input_buffer, 0);
        assert_eq!(regs.output_buffers[0].len(), 0);
    }

    #[test]
    fn test_initialise_idles_armed_input() {
        let mut regs = RegisterFile::new();
        regs.arm_input(16);
        assert_eq!(regs.current_input_buffer, 1);

        regs.initialise(3);

        // Both input buffers are idle again, so the selector must be too.
        assert_eq!(regs.current_input_buffer, 0);
        assert_eq!(regs.input_buffers[0].len(), 0);
        assert_eq!(regs.input_buffers[1].len(), 0);
    }

    #[test]
    fn test_masked_status_respects_enable() {
        let mut regs = RegisterFile::new();
        regs.int_status = IntFlags::OUTPUT_BUFFER_1_EMPTY | IntFlags::OUTPUT_BUFFER_2_EMPTY;
        regs.int_enable = IntFlags::OUTPUT_BUFFER_2_EMPTY;

        assert_eq!(regs.masked_status(), 2);
        assert!(regs.irq_pending());

        regs.int_enable = IntFlags::empty();
        assert_eq!(regs.masked_status(), 0);
        assert!(!regs.irq_pending());
    }

    #[test]
    fn test_arm_input_sets_both_buffers() {
        let mut regs = RegisterFile::new();
        regs.int_status.insert(IntFlags::INPUT_BUFFER_1_FULL);

        regs.arm_input(256);

        assert_eq!(regs.current_input_buffer, 1);
        assert_eq!(regs.input_buffers[0].len(), 256);
        assert_eq!(regs.input_buffers[1].len(), 256);
        assert_eq!(regs.input_buffer_1_available_count, 256);
        assert_eq!(regs.input_buffer_2_available_count, 256);
        assert!(!regs.int_status.contains(IntFlags::INPUT_BUFFER_1_FULL));
    }

    #[test]
    fn test_arm_input_keeps_nonidle_current() {
        let mut regs = RegisterFile::new();
        regs.current_input_buffer = 2;
        regs.arm_input(16);
        assert_eq!(regs.current_input_buffer, 2);
    }

    #[test]
    fn test_rotation_prefers_pending_other_buffer() {
        let mut regs = RegisterFile::new();
        regs.current_output_buffer = 1;
        regs.output_buffers[1].set_length(8);

        regs.rotate_output();
        assert_eq!(regs.current_output_buffer, 2);

        // Buffer 2 drains too; nothing pending, direction idles.
        regs.output_buffers[1].reset();
        regs.rotate_output();
        assert_eq!(regs.current_output_buffer, 0);
    }

    #[test]
    fn test_rotation_idles_when_other_is_empty() {
        let mut regs = RegisterFile::new();
        regs.current_output_buffer = 2;
        regs.rotate_output();
        assert_eq!(regs.current_output_buffer, 0);
    }

    #[test]
    fn test_rotation_is_a_noop_when_idle() {
        let mut regs = RegisterFile::new();
        regs.output_buffers[0].set_length(8);
        regs.rotate_output();
        assert_eq!(regs.current_output_buffer, 0);
    }

    #[test]
    fn test_input_rotation_mirrors_output() {
        let mut regs = RegisterFile::new();
        regs.current_input_buffer = 1;
        regs.input_buffers[1].set_length(4);
        regs.rotate_input();
        assert_eq!(regs.current_input_buffer, 2);
    }

    #[test]
    fn test_reset_buffers_clears_everything() {
        let mut regs = RegisterFile::new();
        regs.arm_input(64);
        regs.current_output_buffer = 2;
        regs.output_buffers[1].set_length(32);

        regs.reset_buffers();

        assert_eq!(regs.current_output_buffer, 0);
        assert_eq!(regs.current_input_buffer, 0);
        assert_eq!(regs.input_buffer_1_available_count, 0);
        assert_eq!(regs.input_buffer_2_available_count, 0);
        for buf in regs.output_buffers.iter().chain(regs.input_buffers.iter()) {
            assert_eq!(buf.len(), 0);
        }
    }
}
