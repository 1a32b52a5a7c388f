//! Register-window command set.
//!
//! The guest drives the device through a fixed set of command offsets in
//! the 4 KiB MMIO window. Read and write offsets are decoded independently;
//! the numeric values must match the guest kernel driver exactly.

use bitflags::bitflags;

/// Commands decoded from guest loads.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum ReadCommand {
    /// Masked interrupt status; a non-zero result lowers the IRQ line.
    IntStatus = 0x00,
    /// Push input buffer 1 into guest memory, return its available count.
    InputBuffer1Available = 0x04,
    /// Push input buffer 2 into guest memory, return its available count.
    InputBuffer2Available = 0x08,
    /// Block for the proxy's 4-byte reply word.
    HostCommandRegionWriteDone = 0x0C,
}

impl ReadCommand {
    /// Decode a window offset into a read command.
    pub fn from_offset(offset: u32) -> Option<Self> {
        match offset {
            0x00 => Some(Self::IntStatus),
            0x04 => Some(Self::InputBuffer1Available),
            0x08 => Some(Self::InputBuffer2Available),
            0x0C => Some(Self::HostCommandRegionWriteDone),
            _ => None,
        }
    }

    /// The raw offset value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Commands decoded from guest stores.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum WriteCommand {
    /// Reset the buffers and program the interrupt enable mask.
    Initialise = 0x00,
    SetInputBuffer1Address = 0x10,
    SetInputBuffer2Address = 0x14,
    SetOutputBuffer1Address = 0x18,
    SetOutputBuffer2Address = 0x1C,
    /// Guest filled output buffer 1; value is the byte count.
    OutputBuffer1Available = 0x20,
    /// Guest filled output buffer 2; value is the byte count.
    OutputBuffer2Available = 0x24,
    /// Arm both input buffers for a guest read of `value` bytes.
    StartInput = 0x28,
    /// Guest is rebooting; flush and notify cooperating processes.
    IoctlSystemReset = 0x2C,
    /// Synchronization barrier; value is the sync token.
    IoctlSignalBufferSync = 0x30,
    /// Advisory gralloc region information; log-only.
    IoctlGrallocAllocatedRegionInfo = 0x34,
}

impl WriteCommand {
    /// Decode a window offset into a write command.
    pub fn from_offset(offset: u32) -> Option<Self> {
        match offset {
            0x00 => Some(Self::Initialise),
            0x10 => Some(Self::SetInputBuffer1Address),
            0x14 => Some(Self::SetInputBuffer2Address),
            0x18 => Some(Self::SetOutputBuffer1Address),
            0x1C => Some(Self::SetOutputBuffer2Address),
            0x20 => Some(Self::OutputBuffer1Available),
            0x24 => Some(Self::OutputBuffer2Available),
            0x28 => Some(Self::StartInput),
            0x2C => Some(Self::IoctlSystemReset),
            0x30 => Some(Self::IoctlSignalBufferSync),
            0x34 => Some(Self::IoctlGrallocAllocatedRegionInfo),
            _ => None,
        }
    }

    /// The raw offset value, as stored in `signal_type`.
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

bitflags! {
    /// Interrupt status/enable bits.
    ///
    /// The IRQ line is high exactly when `status & enable` is non-zero.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct IntFlags: u32 {
        /// Output buffer 1 has been drained and may be refilled.
        const OUTPUT_BUFFER_1_EMPTY = 1 << 0;
        /// Output buffer 2 has been drained and may be refilled.
        const OUTPUT_BUFFER_2_EMPTY = 1 << 1;
        /// Input buffer 1 holds host data ready for the guest.
        const INPUT_BUFFER_1_FULL = 1 << 2;
        /// Input buffer 2 holds host data ready for the guest.
        const INPUT_BUFFER_2_FULL = 1 << 3;
    }
}
