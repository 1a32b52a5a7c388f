//! `glbridge-primitives` — shared wire-level definitions for the glbridge
//! virtual device.
//!
//! Everything two processes (or the guest driver and the device model) must
//! agree on byte-for-byte lives here:
//!
//! - `commands` — register-window command offsets and interrupt bits
//! - `message` — ingress control-message framing
//! - `params` — the parameter-block byte layout published in shared memory
//! - `state` — the persisted device-state codec
//!
//! The device crate consumes these; cooperating host processes can depend
//! on this crate alone to read the published parameter block.

pub mod commands;
pub mod message;
pub mod params;
pub mod state;

pub use commands::{IntFlags, ReadCommand, WriteCommand};
pub use message::ControlMessage;
pub use params::{ParamSnapshot, PARAM_BLOCK_SIZE};

/// Guest-visible size of the MMIO register window.
pub const MMIO_WINDOW_SIZE: u32 = 0x1000;

/// Device name the guest kernel driver attaches to. Limited to 32 chars.
pub const DEVICE_NAME: &str = "virtual-device";

/// Number of IRQ lines the device owns.
pub const IRQ_COUNT: u32 = 1;

/// Capacity of one command buffer as advertised in the parameter block.
pub const COMMAND_BUFFER_SIZE: u32 = 64 * 1024;

/// Command buffers per direction. Doubled in the parameter block because
/// input and output each carry this many.
pub const NUMBER_COMMAND_BUFFERS: u32 = 2;

/// Size of the host-side command ring region.
pub const HOST_BUFFER_SIZE: usize = 1024 * 1024;
