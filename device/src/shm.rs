//! POSIX IPC primitives: named shared regions, named semaphores, and
//! message queues.
//!
//! These wrappers own their kernel objects and release them on drop
//! (unmap/close/unlink). Every operation returns a `Result`; callers treat
//! failures as non-fatal outside device init.
//!
//! Names are qualified with a leading `/` before reaching the kernel, so
//! callers may use either form.

use std::ffi::CString;
use std::io;
use std::time::Duration;

use crate::error::IpcError;

/// Build the kernel-visible object name.
fn qualified_name(name: &str) -> Result<CString, IpcError> {
    let qualified = if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    };
    CString::new(qualified).map_err(|_| IpcError::InvalidName)
}

fn last_os_error() -> IpcError {
    IpcError::Os(io::Error::last_os_error())
}

// ── Named shared region ──

/// A named, mapped, read/write shared-memory region.
///
/// Created with `shm_open` + `ftruncate` + `mmap`; a process that opens the
/// same name sees the same pages. The region is unmapped, closed, and
/// unlinked when dropped.
pub struct SharedRegion {
    name: CString,
    fd: libc::c_int,
    addr: *mut u8,
    size: usize,
}

// The mapping is exclusively owned and only dereferenced through &self/&mut
// self methods.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Create (or truncate) and map a region of `size` bytes.
    pub fn create(name: &str, size: usize) -> Result<Self, IpcError> {
        if size == 0 {
            return Err(IpcError::InvalidSize);
        }
        let cname = qualified_name(name)?;

        let fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_TRUNC | libc::O_RDWR,
                0o666 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(last_os_error());
        }

        if unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(err);
        }

        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            let err = last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(err);
        }

        Ok(Self {
            name: cname,
            fd,
            addr: addr.cast(),
            size,
        })
    }

    /// Size of the mapping in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The mapped pages as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        // The mapping stays valid for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.addr, self.size) }
    }

    /// The mapped pages as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.addr, self.size) }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe {
            if libc::munmap(self.addr.cast(), self.size) != 0 {
                log::warn!("failed to unmap shared region: {}", io::Error::last_os_error());
            }
            libc::close(self.fd);
            libc::shm_unlink(self.name.as_ptr());
        }
    }
}

// ── Named semaphore ──

/// A named counting semaphore used as a one-shot wakeup.
///
/// Opened with `O_CREAT`, mode 0666, initial count 0. The numeric counter
/// value is never inspected; cooperating processes simply wait on it.
pub struct NamedSemaphore {
    name: CString,
    sem: *mut libc::sem_t,
}

// Exclusively owned handle; sem_post is async-signal-safe and takes the
// pointer by value.
unsafe impl Send for NamedSemaphore {}

impl NamedSemaphore {
    /// Open the semaphore, creating it with an initial count of 0.
    pub fn open(name: &str) -> Result<Self, IpcError> {
        let cname = qualified_name(name)?;
        let sem = unsafe {
            libc::sem_open(
                cname.as_ptr(),
                libc::O_CREAT,
                0o666 as libc::c_uint,
                0 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(last_os_error());
        }
        Ok(Self { name: cname, sem })
    }

    /// Wake one waiter.
    pub fn post(&self) -> Result<(), IpcError> {
        if unsafe { libc::sem_post(self.sem) } != 0 {
            return Err(last_os_error());
        }
        Ok(())
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
            libc::sem_unlink(self.name.as_ptr());
        }
    }
}

// ── Message queue ──

/// Attributes of an open message queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAttrs {
    pub max_msgs: i64,
    pub msg_size: i64,
    pub current_msgs: i64,
    pub nonblocking: bool,
}

/// A POSIX message queue.
///
/// A queue built with `create` owns the kernel object and unlinks it on
/// drop; one built with `open` only closes its descriptor.
pub struct MessageQueue {
    name: CString,
    mqd: libc::mqd_t,
    msg_size: usize,
    owned: bool,
}

// mqd_t is a plain descriptor.
unsafe impl Send for MessageQueue {}

impl MessageQueue {
    /// Create a queue with the given depth and message size.
    pub fn create(
        name: &str,
        max_msgs: i64,
        msg_size: i64,
        nonblocking: bool,
    ) -> Result<Self, IpcError> {
        let cname = qualified_name(name)?;
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        attr.mq_maxmsg = max_msgs as _;
        attr.mq_msgsize = msg_size as _;

        let mut oflag = libc::O_CREAT | libc::O_RDWR;
        if nonblocking {
            oflag |= libc::O_NONBLOCK;
        }
        let mqd = unsafe {
            libc::mq_open(
                cname.as_ptr(),
                oflag,
                0o666 as libc::c_uint,
                &mut attr as *mut libc::mq_attr,
            )
        };
        if mqd < 0 {
            return Err(last_os_error());
        }
        Ok(Self {
            name: cname,
            mqd,
            msg_size: msg_size as usize,
            owned: true,
        })
    }

    /// Open an existing queue for sending.
    pub fn open(name: &str) -> Result<Self, IpcError> {
        let cname = qualified_name(name)?;
        let mqd = unsafe { libc::mq_open(cname.as_ptr(), libc::O_RDWR) };
        if mqd < 0 {
            return Err(last_os_error());
        }
        let mut queue = Self {
            name: cname,
            mqd,
            msg_size: 0,
            owned: false,
        };
        let attrs = queue.attrs()?;
        queue.msg_size = attrs.msg_size as usize;
        Ok(queue)
    }

    /// Queue attributes, including the current message count.
    pub fn attrs(&self) -> Result<QueueAttrs, IpcError> {
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        if unsafe { libc::mq_getattr(self.mqd, &mut attr) } != 0 {
            return Err(last_os_error());
        }
        Ok(QueueAttrs {
            max_msgs: attr.mq_maxmsg as i64,
            msg_size: attr.mq_msgsize as i64,
            current_msgs: attr.mq_curmsgs as i64,
            nonblocking: (attr.mq_flags as i64 & libc::O_NONBLOCK as i64) != 0,
        })
    }

    /// Send a message at the given priority.
    pub fn send(&self, bytes: &[u8], priority: u32) -> Result<(), IpcError> {
        let rc = unsafe {
            libc::mq_send(self.mqd, bytes.as_ptr().cast(), bytes.len(), priority)
        };
        if rc != 0 {
            return Err(last_os_error());
        }
        Ok(())
    }

    /// Receive one message, or `None` when the queue is empty (nonblocking).
    pub fn receive(&self) -> Result<Option<(Vec<u8>, u32)>, IpcError> {
        let mut buf = vec![0u8; self.msg_size.max(1)];
        let mut priority: libc::c_uint = 0;
        let n = unsafe {
            libc::mq_receive(self.mqd, buf.as_mut_ptr().cast(), buf.len(), &mut priority)
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(None);
            }
            return Err(IpcError::Os(err));
        }
        buf.truncate(n as usize);
        Ok(Some((buf, priority)))
    }

    /// Receive with a timeout, or `None` when the deadline passes.
    ///
    /// `seconds` is decomposed into whole seconds and nanoseconds on top of
    /// the current realtime clock.
    pub fn receive_timeout(&self, seconds: f64) -> Result<Option<(Vec<u8>, u32)>, IpcError> {
        let mut now = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } != 0 {
            return Err(last_os_error());
        }
        let wait = Duration::from_secs_f64(seconds.max(0.0));
        let mut deadline = libc::timespec {
            tv_sec: now.tv_sec + wait.as_secs() as libc::time_t,
            tv_nsec: now.tv_nsec + wait.subsec_nanos() as libc::c_long,
        };
        if deadline.tv_nsec >= 1_000_000_000 {
            deadline.tv_sec += 1;
            deadline.tv_nsec -= 1_000_000_000;
        }

        let mut buf = vec![0u8; self.msg_size.max(1)];
        let mut priority: libc::c_uint = 0;
        let n = unsafe {
            libc::mq_timedreceive(
                self.mqd,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut priority,
                &deadline,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => return Ok(None),
                Some(libc::EAGAIN) => return Ok(None),
                _ => return Err(IpcError::Os(err)),
            }
        }
        buf.truncate(n as usize);
        Ok(Some((buf, priority)))
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        unsafe {
            libc::mq_close(self.mqd);
            if self.owned {
                libc::mq_unlink(self.name.as_ptr());
            }
        }
    }
}
