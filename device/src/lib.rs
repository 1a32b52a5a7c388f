//! `glbridge-device` — host-side virtual device bridging a guest graphics
//! stack to an external proxy process.
//!
//! The guest sees a memory-mapped register window; behind it this crate
//! owns the double-buffered DMA traffic, streams command bytes to the proxy
//! over a Unix socket, accepts asynchronous control messages back, and
//! publishes a diagnostic parameter block in named shared memory for
//! cooperating host processes. It enforces:
//!
//! - **MMIO serialization:** all register handling runs on the emulator
//!   thread; only the parameter-mutex fields are shared with the ingress
//!   watcher
//! - **Lossless egress:** socket writes survive EINTR/EAGAIN storms and
//!   proxy reconnects without dropping or duplicating a byte
//! - **IRQ discipline:** the line level always equals
//!   `(int_status & int_enable) != 0`
//!
//! The primary entry point is [`VirtualDevice::new`].

pub mod buffer;
pub mod config;
pub mod device;
pub mod egress;
pub mod error;
pub mod ingress;
pub mod registers;
pub mod ring;
pub mod shm;

pub use config::DeviceConfig;
pub use device::{DeviceInfo, VirtualDevice};
pub use error::DeviceError;
