//! `glbridge-hostapi` — emulator-facing trait definitions for the glbridge
//! virtual device.
//!
//! The device model is embedded in a full-system emulator but never links
//! against it. This crate defines the narrow surface the two sides exchange:
//!
//! - `GuestBus` — the callbacks the emulator provides to the device: guest
//!   physical memory access and the IRQ line
//! - `MmioHandler` — the register-window entrypoints the device provides to
//!   the emulator
//! - `MemBus` — a flat-RAM `GuestBus` for tests
//!
//! All calls are synchronous and infallible; the emulator serializes MMIO
//! callbacks on its CPU thread and no error may cross that boundary.

pub mod mem_bus;
pub mod traits;

// Re-export commonly used types at the crate root.
pub use mem_bus::MemBus;
pub use traits::{GuestBus, MmioHandler};
