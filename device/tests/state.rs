//! Persisted-state schema coverage on the assembled device.

mod common;

use glbridge_hostapi::MmioHandler;
use glbridge_primitives::{params, state, ReadCommand, WriteCommand};

use common::*;

#[test]
fn test_save_blob_layout() {
    let stub = ProxyStub::start(1);
    let (mut device, _bus) = boot_device(&stub);

    device.mmio_write(WriteCommand::Initialise.as_u32(), 3);
    let blob = device.save_state();

    assert_eq!(blob.len(), state::STATE_BLOB_LEN);
    // Version 2, then int_status and int_enable, all big-endian.
    assert_eq!(&blob[0..4], &[0, 0, 0, 2]);
    assert_eq!(&blob[4..8], &[0, 0, 0, 3]);
    assert_eq!(&blob[8..12], &[0, 0, 0, 3]);
}

#[test]
fn test_load_restores_interrupt_registers() {
    let stub = ProxyStub::start(1);
    let (mut device, bus) = boot_device(&stub);

    device.mmio_write(WriteCommand::Initialise.as_u32(), 3);
    let blob = device.save_state();

    // Diverge, then restore.
    device.mmio_write(WriteCommand::Initialise.as_u32(), 0);
    assert!(!bus.irq_level());

    device.load_state(&blob).expect("load must succeed");
    assert_eq!(read_param(&device, params::offsets::INT_STATUS), 3);
    assert_eq!(read_param(&device, params::offsets::INT_ENABLE), 3);
    assert!(bus.irq_level(), "restored pending bits must re-raise the line");
    assert_eq!(device.mmio_read(ReadCommand::IntStatus.as_u32()), 3);
}

#[test]
fn test_version_mismatch_leaves_state_untouched() {
    let stub = ProxyStub::start(1);
    let (mut device, bus) = boot_device(&stub);

    device.mmio_write(WriteCommand::Initialise.as_u32(), 3);
    let mut blob = device.save_state();
    blob[3] = 9; // wrong version

    assert!(device.load_state(&blob).is_err());
    assert_eq!(read_param(&device, params::offsets::INT_STATUS), 3);
    assert_eq!(read_param(&device, params::offsets::INT_ENABLE), 3);
    assert!(bus.irq_level());
}

fn read_param(device: &glbridge_device::VirtualDevice, offset: usize) -> u32 {
    params::read_field(device.params_block(), offset).unwrap()
}
