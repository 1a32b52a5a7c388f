//! Ingress notifier: asynchronous proxy-to-device signalling.
//!
//! The proxy posts control messages on a POSIX message queue. Delivery runs
//! on a dedicated watcher thread that polls the nonblocking queue; each
//! batch is drained according to the queue's current depth and dispatched
//! under the parameters mutex. The watcher is the only context besides the
//! emulator thread that mutates device state, and it touches nothing
//! outside `SharedParams`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use glbridge_primitives::ControlMessage;

use crate::registers::SharedParams;
use crate::shm::MessageQueue;

/// Idle poll interval of the watcher thread.
const POLL_SLEEP: Duration = Duration::from_millis(10);

/// Remove any messages left over from a previous run.
///
/// Returns the number of stale messages dropped. Queue failures are logged
/// and end the drain; they are not fatal.
pub fn drain_residue(queue: &MessageQueue) -> usize {
    let mut dropped = 0;
    loop {
        match queue.receive() {
            Ok(Some((bytes, _))) => {
                dropped += 1;
                log::debug!("dropping {} stale ingress bytes", bytes.len());
            }
            Ok(None) => break,
            Err(err) => {
                log::warn!("ingress residue drain failed: {err}");
                break;
            }
        }
    }
    dropped
}

/// Watcher-thread handle. Dropping it stops and joins the thread, which in
/// turn closes and unlinks the queue; deregistration strictly precedes
/// queue close.
pub struct IngressNotifier {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IngressNotifier {
    /// Take ownership of the queue and start watching it.
    pub fn start(queue: MessageQueue, shared: Arc<Mutex<SharedParams>>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("glbridge-ingress".into())
            .spawn(move || watch(queue, shared, flag))
            .ok();
        if handle.is_none() {
            log::warn!("could not spawn ingress watcher; proxy signalling disabled");
        }
        Self {
            shutdown,
            handle,
        }
    }

    /// True while the watcher is running.
    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the watcher and wait for it to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IngressNotifier {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(queue: MessageQueue, shared: Arc<Mutex<SharedParams>>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match queue.receive() {
            Ok(Some((bytes, _priority))) => {
                dispatch(&bytes, &shared);
                // Drain whatever else arrived in the same burst before
                // going back to sleep.
                let pending = queue.attrs().map(|a| a.current_msgs).unwrap_or(0);
                for _ in 0..pending {
                    match queue.receive() {
                        Ok(Some((bytes, _))) => dispatch(&bytes, &shared),
                        Ok(None) => break,
                        Err(err) => {
                            log::warn!("ingress receive failed: {err}");
                            break;
                        }
                    }
                }
            }
            Ok(None) => thread::sleep(POLL_SLEEP),
            Err(err) => {
                log::warn!("ingress receive failed: {err}");
                thread::sleep(POLL_SLEEP);
            }
        }
    }
}

/// Decode one message and apply it under the parameters mutex.
fn dispatch(bytes: &[u8], shared: &Mutex<SharedParams>) {
    match ControlMessage::decode(bytes) {
        Ok(ControlMessage::ResetHostBufferPointer) => {
            let mut params = shared.lock().unwrap_or_else(|e| e.into_inner());
            params.host_data_buffer_offset = 0;
            log::debug!("host buffer pointer reset by proxy");
        }
        Err(err) => {
            log::warn!("dropping {}-byte ingress message: {err}", bytes.len());
        }
    }
}
