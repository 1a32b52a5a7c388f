//! Device configuration.

use std::path::PathBuf;

use glbridge_primitives::HOST_BUFFER_SIZE;

/// Configuration for one virtual-device instance.
///
/// The defaults are the well-known names the guest driver and the proxy
/// agree on. Tests override them so parallel instances do not collide on
/// the global IPC namespace.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Filesystem path of the proxy's stream socket.
    pub socket_path: PathBuf,

    /// Name of the shared parameter-block region.
    pub params_region: String,

    /// Name of the shared host command-ring region.
    pub ring_region: String,

    /// Name of the ingress message queue.
    pub queue_name: String,

    /// Maximum queued ingress messages.
    pub queue_depth: i64,

    /// Maximum ingress message size in bytes.
    pub queue_msg_size: i64,

    /// Name of the buffer-sync semaphore.
    pub sync_semaphore: String,

    /// Name of the guest-reset semaphore.
    pub reset_semaphore: String,

    /// Size of the host command ring in bytes.
    pub host_buffer_size: usize,

    /// IRQ line index driven through the guest bus.
    pub irq_line: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/glproxy-socket"),
            params_region: "qemu_vd1_params".into(),
            ring_region: "qemu_vd1_inputBuffer".into(),
            queue_name: "/gles2emulator_msgQInput".into(),
            queue_depth: 32,
            queue_msg_size: 8192,
            sync_semaphore: "qemu_vd1_semaphore".into(),
            reset_semaphore: "qemu_vd1_systemReset_sem".into(),
            host_buffer_size: HOST_BUFFER_SIZE,
            irq_line: 0,
        }
    }
}
