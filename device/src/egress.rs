//! Egress stream socket to the external proxy.
//!
//! The proxy consumes the guest's command bytes over a Unix stream socket.
//! The connection is made lazily on first write and re-made transparently
//! after failures: a hard error mid-write closes the stream, reopens it,
//! and resumes from the first unwritten byte, so the proxy never sees a
//! byte dropped or repeated. A stream (not a datagram) socket is required:
//! command batches exceed datagram limits and partial-write resumption
//! depends on byte-stream ordering.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Sleep between retries of the 4-byte reply read.
const REPLY_RETRY_SLEEP: Duration = Duration::from_millis(1);

/// Egress failures surfaced to the register file.
#[derive(Debug, thiserror::Error)]
pub enum EgressError {
    /// No connection could be established; nothing was written.
    #[error("proxy socket not connected")]
    NotConnected,

    /// The connection died and could not be re-established.
    #[error("proxy socket: {0}")]
    Io(#[from] io::Error),
}

/// Persistent stream connection to the proxy.
pub struct EgressSocket {
    path: PathBuf,
    stream: Option<UnixStream>,
}

impl EgressSocket {
    /// Create the socket handle; no connection is attempted yet.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            stream: None,
        }
    }

    /// True while a connection is believed healthy.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Drop the current connection; the next write reconnects.
    pub fn disconnect(&mut self) {
        self.stream = None;
    }

    /// Connect if not already connected, looping on EINTR.
    fn ensure_connected(&mut self) -> Result<(), EgressError> {
        if self.stream.is_some() {
            return Ok(());
        }
        loop {
            match UnixStream::connect(&self.path) {
                Ok(stream) => {
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::warn!("connect to proxy at {:?} failed: {err}", self.path);
                    return Err(EgressError::NotConnected);
                }
            }
        }
    }

    /// Write all of `data` to the proxy.
    ///
    /// Returns once every byte is written. A hard error mid-stream closes
    /// the connection, reopens it, and resumes from the first unwritten
    /// byte; the reopen failing is the only way out with an error.
    pub fn write_buffer(&mut self, data: &[u8]) -> Result<(), EgressError> {
        self.ensure_connected()?;
        let mut written = 0;
        while written < data.len() {
            let Some(stream) = self.stream.as_mut() else {
                return Err(EgressError::NotConnected);
            };
            let (n, err) = write_chunk(stream, &data[written..]);
            written += n;
            if let Some(err) = err {
                log::warn!(
                    "proxy connection lost after {written}/{} bytes, reopening: {err}",
                    data.len()
                );
                self.disconnect();
                self.ensure_connected()?;
            }
        }
        Ok(())
    }

    /// Read the proxy's 4-byte little-endian reply word.
    ///
    /// Blocks until the word arrives, sleeping briefly on EINTR/EAGAIN. A
    /// hard error or EOF closes the connection (the next write reconnects)
    /// and surfaces the error.
    pub fn read_reply_u32(&mut self) -> Result<u32, EgressError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(EgressError::NotConnected);
        };
        let mut word = [0u8; 4];
        match read_exact_retrying(stream, &mut word) {
            Ok(()) => Ok(u32::from_le_bytes(word)),
            Err(err) => {
                log::warn!("proxy reply read failed: {err}");
                self.disconnect();
                Err(EgressError::Io(err))
            }
        }
    }
}

/// Write as much of `buf` as possible, retrying EINTR/EAGAIN in place.
///
/// Returns the bytes written plus the error that stopped the loop, if any.
fn write_chunk<W: Write>(writer: &mut W, buf: &[u8]) -> (usize, Option<io::Error>) {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => {
                return (
                    written,
                    Some(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "proxy closed the stream",
                    )),
                );
            }
            Ok(n) => written += n,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) =>
            {
                continue;
            }
            Err(err) => return (written, Some(err)),
        }
    }
    (written, None)
}

/// Fill `buf` from the stream, sleeping briefly on EINTR/EAGAIN.
fn read_exact_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "proxy closed the stream",
                ));
            }
            Ok(n) => filled += n,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) =>
            {
                thread::sleep(REPLY_RETRY_SLEEP);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
