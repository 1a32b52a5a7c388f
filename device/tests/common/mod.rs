//! Shared test helpers for integration tests.
//!
//! Provides a proxy stub listening on a Unix socket, a device factory with
//! per-test-unique IPC names (the kernel namespace for shared memory,
//! semaphores, and queues is global), and a shared-bus wrapper so tests can
//! inspect guest RAM and the IRQ line while the device owns the bus.

#![allow(dead_code)]

use std::io::Read;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use glbridge_device::{DeviceConfig, VirtualDevice};
use glbridge_hostapi::{GuestBus, MemBus};

/// Per-process counter so every test gets its own IPC namespace.
static INSTANCE: AtomicU32 = AtomicU32::new(0);

/// A `GuestBus` handle tests can keep while the device owns the bus.
#[derive(Clone)]
pub struct SharedBus(pub Arc<Mutex<MemBus>>);

impl SharedBus {
    pub fn new(ram_size: usize) -> Self {
        Self(Arc::new(Mutex::new(MemBus::new(ram_size))))
    }

    pub fn seed(&self, addr: usize, bytes: &[u8]) {
        let mut bus = self.0.lock().unwrap();
        bus.ram_mut()[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    pub fn read(&self, addr: usize, len: usize) -> Vec<u8> {
        self.0.lock().unwrap().ram()[addr..addr + len].to_vec()
    }

    pub fn irq_level(&self) -> bool {
        self.0.lock().unwrap().irq_level()
    }
}

impl GuestBus for SharedBus {
    fn read_physical(&mut self, addr: u32, buf: &mut [u8]) {
        self.0.lock().unwrap().read_physical(addr, buf);
    }

    fn write_physical(&mut self, addr: u32, buf: &[u8]) {
        self.0.lock().unwrap().write_physical(addr, buf);
    }

    fn set_irq_level(&mut self, line: u32, level: bool) {
        self.0.lock().unwrap().set_irq_level(line, level);
    }
}

/// Proxy stub: accepts connections on the egress socket path and records
/// every byte received, per connection.
pub struct ProxyStub {
    pub path: PathBuf,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
    handle: Option<JoinHandle<()>>,
    _dir: tempfile::TempDir,
}

impl ProxyStub {
    /// Start a stub that serves `connections` accepted connections, feeding
    /// each accepted stream to `serve`.
    pub fn start_with(
        connections: usize,
        serve: impl Fn(&mut UnixStream, &Mutex<Vec<Vec<u8>>>) + Send + Sync + 'static,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glproxy.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let received: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let record = Arc::clone(&received);
        let stop = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            for _ in 0..connections {
                let Ok((mut conn, _)) = listener.accept() else {
                    return;
                };
                // A device under test may never connect; drop() wakes the
                // accept with a throwaway connection instead.
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                record.lock().unwrap().push(Vec::new());
                serve(&mut conn, &record);
            }
        });

        Self {
            path,
            received,
            shutdown,
            handle: Some(handle),
            _dir: dir,
        }
    }

    /// Stub that drains each connection to EOF.
    pub fn start(connections: usize) -> Self {
        Self::start_with(connections, |conn, record| {
            let mut buf = [0u8; 4096];
            loop {
                match conn.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut received = record.lock().unwrap();
                        let last = received.last_mut().unwrap();
                        last.extend_from_slice(&buf[..n]);
                    }
                }
            }
        })
    }

    /// Bytes received on connection `i`, waiting up to two seconds for at
    /// least `min_len` of them to arrive.
    pub fn wait_received(&self, i: usize, min_len: usize) -> Vec<u8> {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            {
                let received = self.received.lock().unwrap();
                if let Some(conn) = received.get(i) {
                    if conn.len() >= min_len {
                        return conn.clone();
                    }
                }
            }
            if std::time::Instant::now() > deadline {
                let received = self.received.lock().unwrap();
                return received.get(i).cloned().unwrap_or_default();
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

}

impl Drop for ProxyStub {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Unblock a pending accept; fails harmlessly once the listener is
        // gone.
        let _ = UnixStream::connect(&self.path);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Config with per-test-unique IPC names pointing at the stub's socket.
pub fn test_config(socket_path: &std::path::Path) -> DeviceConfig {
    let n = INSTANCE.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    DeviceConfig {
        socket_path: socket_path.to_path_buf(),
        params_region: format!("glbridge-it-params-{pid}-{n}"),
        ring_region: format!("glbridge-it-ring-{pid}-{n}"),
        queue_name: format!("/glbridge-it-msgq-{pid}-{n}"),
        sync_semaphore: format!("glbridge-it-sync-{pid}-{n}"),
        reset_semaphore: format!("glbridge-it-reset-{pid}-{n}"),
        host_buffer_size: 4096,
        ..DeviceConfig::default()
    }
}

/// A device wired to fresh guest RAM and a proxy stub.
pub fn boot_device(stub: &ProxyStub) -> (VirtualDevice, SharedBus) {
    let bus = SharedBus::new(64 * 1024);
    let config = test_config(&stub.path);
    let device = VirtualDevice::new(0xFF00_0000, 1, config, Box::new(bus.clone()))
        .expect("device init");
    (device, bus)
}
