//! Device assembly.
//!
//! `VirtualDevice` wires the IPC primitives, DMA buffers, egress socket,
//! ingress notifier, and register file into one device instance and
//! implements the MMIO entrypoints the emulator calls. Constructing it
//! performs the whole init sequence; a failure anywhere aborts cleanly and
//! the device is simply not attached.

use std::sync::{Arc, Mutex, PoisonError};

use glbridge_hostapi::{GuestBus, MmioHandler};
use glbridge_primitives::{
    params::ParamSnapshot,
    state::{self, SavedState},
    IntFlags, ReadCommand, WriteCommand, COMMAND_BUFFER_SIZE, DEVICE_NAME, IRQ_COUNT,
    MMIO_WINDOW_SIZE, NUMBER_COMMAND_BUFFERS, PARAM_BLOCK_SIZE,
};

use crate::config::DeviceConfig;
use crate::egress::EgressSocket;
use crate::error::DeviceError;
use crate::ingress::{self, IngressNotifier};
use crate::registers::{RegisterFile, SharedParams};
use crate::ring::{self, HostRing};
use crate::shm::{MessageQueue, NamedSemaphore, SharedRegion};

/// Returned from the reply register when the proxy connection died.
const REPLY_FAILURE: u32 = 0xFFFF_FFFF;

/// Identity published to the emulator at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: &'static str,
    pub id: u32,
    pub base: u32,
    pub size: u32,
    pub irq_count: u32,
}

/// One assembled virtual-device instance.
pub struct VirtualDevice {
    // Field order is teardown order: the notifier must stop (closing and
    // unlinking the queue) before the shared resources go away.
    notifier: IngressNotifier,
    egress: EgressSocket,
    sync_sem: NamedSemaphore,
    reset_sem: NamedSemaphore,
    ring: HostRing,
    params_region: SharedRegion,
    shared: Arc<Mutex<SharedParams>>,
    regs: RegisterFile,
    bus: Box<dyn GuestBus>,
    config: DeviceConfig,
    base: u32,
    id: u32,
}

impl VirtualDevice {
    /// Build a device at guest physical `base` with the given identity.
    ///
    /// Creates and publishes the parameter block, the host command ring,
    /// both semaphores, and the ingress queue (draining stale residue and
    /// starting the watcher), then prepares the egress socket. The caller
    /// registers the returned instance with the emulator under `info()`.
    pub fn new(
        base: u32,
        id: u32,
        config: DeviceConfig,
        bus: Box<dyn GuestBus>,
    ) -> Result<Self, DeviceError> {
        let mut params_region = SharedRegion::create(&config.params_region, PARAM_BLOCK_SIZE)
            .map_err(|e| DeviceError::ipc(&config.params_region, e))?;
        params_region.as_mut_slice().fill(0);

        let ring_region = SharedRegion::create(&config.ring_region, config.host_buffer_size)
            .map_err(|e| DeviceError::ipc(&config.ring_region, e))?;

        let reset_sem = NamedSemaphore::open(&config.reset_semaphore)
            .map_err(|e| DeviceError::ipc(&config.reset_semaphore, e))?;
        let sync_sem = NamedSemaphore::open(&config.sync_semaphore)
            .map_err(|e| DeviceError::ipc(&config.sync_semaphore, e))?;

        let queue = MessageQueue::create(
            &config.queue_name,
            config.queue_depth,
            config.queue_msg_size,
            true,
        )
        .map_err(|e| DeviceError::ipc(&config.queue_name, e))?;
        let stale = ingress::drain_residue(&queue);
        if stale > 0 {
            log::info!("discarded {stale} stale ingress messages");
        }

        let shared = Arc::new(Mutex::new(SharedParams::default()));
        let notifier = IngressNotifier::start(queue, Arc::clone(&shared));

        let egress = EgressSocket::new(&config.socket_path);

        let mut device = Self {
            notifier,
            egress,
            sync_sem,
            reset_sem,
            ring: HostRing::new(ring_region),
            params_region,
            shared,
            regs: RegisterFile::new(),
            bus,
            config,
            base,
            id,
        };
        device.publish_params();
        log::info!(
            "virtual device {id} installed at {base:#010x} ({})",
            device.config.socket_path.display()
        );
        Ok(device)
    }

    /// Identity the emulator registers this device under.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: DEVICE_NAME,
            id: self.id,
            base: self.base,
            size: MMIO_WINDOW_SIZE,
            irq_count: IRQ_COUNT,
        }
    }

    /// The published parameter block, as a cooperating process sees it.
    pub fn params_block(&self) -> &[u8] {
        self.params_region.as_slice()
    }

    /// Current host-ring fill cursor.
    pub fn host_data_buffer_offset(&self) -> u32 {
        self.lock_shared().host_data_buffer_offset
    }

    /// True while the ingress watcher is armed.
    pub fn ingress_armed(&self) -> bool {
        self.notifier.is_armed()
    }

    /// Persist the device registers (version-tagged blob).
    pub fn save_state(&self) -> Vec<u8> {
        state::encode_state(&SavedState {
            int_status: self.regs.int_status.bits(),
            int_enable: self.regs.int_enable.bits(),
        })
        .to_vec()
    }

    /// Restore registers from a saved blob.
    ///
    /// A version mismatch or short blob fails the load and leaves the
    /// device state untouched.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        let saved = state::decode_state(bytes)?;
        self.regs.int_status = IntFlags::from_bits_retain(saved.int_status);
        self.regs.int_enable = IntFlags::from_bits_retain(saved.int_enable);
        self.update_irq();
        self.publish_params();
        Ok(())
    }

    fn lock_shared(&self) -> std::sync::MutexGuard<'_, SharedParams> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_irq(&mut self) {
        let level = self.regs.irq_pending();
        self.bus.set_irq_level(self.config.irq_line, level);
    }

    /// Mirror the register file into the shared parameter block.
    fn publish_params(&mut self) {
        let shared = *self.lock_shared();
        let snapshot = ParamSnapshot {
            int_status: self.regs.int_status.bits(),
            int_enable: self.regs.int_enable.bits(),
            region_write_done: self.regs.region_write_done,
            sync_value: self.regs.sync_value,
            number_of_buffers: NUMBER_COMMAND_BUFFERS * 2,
            each_buffer_size: COMMAND_BUFFER_SIZE,
            total_buffers_length: COMMAND_BUFFER_SIZE * NUMBER_COMMAND_BUFFERS * 2,
            host_buffer_length: self.config.host_buffer_size as u32,
            input_buffer_1_available_count: self.regs.input_buffer_1_available_count,
            input_buffer_2_available_count: self.regs.input_buffer_2_available_count,
            current_input_buffer: self.regs.current_input_buffer,
            current_output_buffer: self.regs.current_output_buffer,
            signal_type: shared.signal_type,
            signal_value: shared.signal_value,
            host_data_buffer_offset: shared.host_data_buffer_offset,
        };
        snapshot.encode_into(self.params_region.as_mut_slice());
    }

    /// Drain pending output into the host ring and refresh the IRQ line.
    fn flush_to_ring(&mut self) {
        let mut params = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cursor = params.host_data_buffer_offset;
        let moved = ring::drain_output(&mut self.regs, &mut self.ring, &mut cursor);
        params.host_data_buffer_offset = cursor;
        drop(params);
        if moved > 0 {
            log::debug!("drained {moved} bytes into the host ring");
        }
        self.update_irq();
    }

    /// Guest handed us a filled output buffer.
    fn output_available(&mut self, n: u32, len: u32) {
        if self.regs.current_output_buffer == 0 {
            self.regs.current_output_buffer = n;
        }
        let idx = (n - 1) as usize;
        let buf = &mut self.regs.output_buffers[idx];
        buf.set_length(len as usize);
        buf.read_from_guest(self.bus.as_mut());

        if let Err(err) = self.egress.write_buffer(self.regs.output_buffers[idx].bytes()) {
            // The command is dropped; the next write reconnects.
            log::warn!("output buffer {n} not delivered to proxy: {err}");
        }

        if n == 1 {
            self.regs.int_status.remove(IntFlags::OUTPUT_BUFFER_1_EMPTY);
        } else {
            self.regs.int_status.insert(IntFlags::OUTPUT_BUFFER_2_EMPTY);
            self.update_irq();
        }
    }

    /// Guest is rebooting.
    fn system_reset(&mut self) {
        log::info!("guest signalled system reset");
        self.flush_to_ring();
        if let Err(err) = self.reset_sem.post() {
            log::warn!("reset semaphore post failed: {err}");
        }
        self.regs.reset_buffers();
        self.lock_shared().host_data_buffer_offset = 0;
        self.update_irq();
    }

    /// Guest requested a buffer-sync barrier.
    fn buffer_sync(&mut self, value: u32) {
        {
            let mut params = self.lock_shared();
            params.signal_type = WriteCommand::IoctlSignalBufferSync.as_u32();
            params.signal_value = value;
        }
        self.regs.sync_value = value;
        self.flush_to_ring();
        if let Err(err) = self.sync_sem.post() {
            log::warn!("sync semaphore post failed: {err}");
        }
    }
}

impl MmioHandler for VirtualDevice {
    fn mmio_read(&mut self, offset: u32) -> u32 {
        let value = match ReadCommand::from_offset(offset) {
            Some(ReadCommand::IntStatus) => {
                let ret = self.regs.masked_status();
                if ret != 0 {
                    // Acknowledgement: the returned bits are consumed and
                    // the line drops, so the level invariant still holds.
                    self.regs.int_status.remove(IntFlags::from_bits_retain(ret));
                    self.bus.set_irq_level(self.config.irq_line, false);
                }
                ret
            }
            Some(ReadCommand::InputBuffer1Available) => {
                self.regs.input_buffers[0].write_to_guest(self.bus.as_mut());
                self.regs.input_buffer_1_available_count
            }
            Some(ReadCommand::InputBuffer2Available) => {
                self.regs.input_buffers[1].write_to_guest(self.bus.as_mut());
                self.regs.input_buffer_2_available_count
            }
            Some(ReadCommand::HostCommandRegionWriteDone) => match self.egress.read_reply_u32() {
                Ok(reply) => {
                    self.regs.region_write_done = reply;
                    reply
                }
                Err(err) => {
                    log::warn!("proxy reply unavailable: {err}");
                    REPLY_FAILURE
                }
            },
            None => {
                log::debug!("unhandled register read at {offset:#x}");
                0
            }
        };
        self.publish_params();
        value
    }

    fn mmio_write(&mut self, offset: u32, value: u32) {
        match WriteCommand::from_offset(offset) {
            Some(WriteCommand::Initialise) => {
                self.regs.initialise(value);
                self.update_irq();
            }
            Some(WriteCommand::SetInputBuffer1Address) => {
                self.regs.input_buffers[0].set_guest_addr(value);
            }
            Some(WriteCommand::SetInputBuffer2Address) => {
                self.regs.input_buffers[1].set_guest_addr(value);
            }
            Some(WriteCommand::SetOutputBuffer1Address) => {
                self.regs.output_buffers[0].set_guest_addr(value);
            }
            Some(WriteCommand::SetOutputBuffer2Address) => {
                self.regs.output_buffers[1].set_guest_addr(value);
            }
            Some(WriteCommand::OutputBuffer1Available) => self.output_available(1, value),
            Some(WriteCommand::OutputBuffer2Available) => self.output_available(2, value),
            Some(WriteCommand::StartInput) => {
                self.regs.arm_input(value);
                self.update_irq();
            }
            Some(WriteCommand::IoctlSystemReset) => self.system_reset(),
            Some(WriteCommand::IoctlSignalBufferSync) => self.buffer_sync(value),
            Some(WriteCommand::IoctlGrallocAllocatedRegionInfo) => {
                log::debug!("gralloc region info: {value:#010x}");
            }
            None => {
                log::debug!("unhandled register write at {offset:#x} (value {value:#x})");
            }
        }
        self.publish_params();
    }
}
