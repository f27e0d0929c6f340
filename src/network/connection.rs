//! Blocking framed connection
//!
//! Satu TcpStream, dua lock: satu untuk sisi baca, satu untuk sisi tulis.
//! Semua receive primitive memegang read lock sampai frame lengkap,
//! jadi dua reader tidak pernah saling menyela partial read. Handle ketiga
//! (tanpa lock) hanya dipakai untuk shutdown, jadi `close()` tidak pernah
//! menunggu read atau write yang sedang blocking.
//!
//! Frame: `[len i32 big-endian][len bytes payload]`

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::TransportError;

/// Frame header size
pub const HEADER_SIZE: usize = 4;

/// Default batas payload per frame (64MB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Default socket buffer (256KB)
pub const DEFAULT_SOCKET_BUFFER: usize = 256 * 1024;

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// TCP_NODELAY
    pub nodelay: bool,
    /// SO_SNDBUF / SO_RCVBUF (unix only)
    pub socket_buffer_size: Option<usize>,
    /// Batas waktu satu read; `None` = blocking penuh
    pub read_timeout: Option<Duration>,
    /// Frame dengan header lebih besar dari ini ditolak
    pub max_frame_len: usize,
    /// Shutdown socket otomatis setelah truncated read
    pub close_on_truncated: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            socket_buffer_size: Some(DEFAULT_SOCKET_BUFFER),
            read_timeout: None,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            close_on_truncated: false,
        }
    }
}

impl ConnectionConfig {
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn socket_buffer_size(mut self, size: Option<usize>) -> Self {
        self.socket_buffer_size = size;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn max_frame_len(mut self, max: usize) -> Self {
        self.max_frame_len = max;
        self
    }

    pub fn close_on_truncated(mut self, close: bool) -> Self {
        self.close_on_truncated = close;
        self
    }
}

/// Generator nama default untuk connection tanpa nama
///
/// Di-inject ke constructor (listener, client), bukan static global.
#[derive(Debug)]
pub struct ConnectionNamer {
    prefix: Cow<'static, str>,
    next: AtomicU64,
}

impl ConnectionNamer {
    pub fn new(prefix: impl Into<Cow<'static, str>>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }

    pub fn next_name(&self) -> String {
        format!("{}{}", self.prefix, self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionNamer {
    fn default() -> Self {
        Self::new("unnamed-client-")
    }
}

/// Framed connection di atas satu TcpStream
pub struct Connection {
    name: String,
    reader: Mutex<TcpStream>,
    writer: Mutex<TcpStream>,
    closer: TcpStream,
    closed: AtomicBool,
    peer_addr: Option<SocketAddr>,
    config: ConnectionConfig,
}

impl Connection {
    /// Wrap TcpStream yang sudah terhubung
    pub fn new(stream: TcpStream, name: impl Into<String>, config: ConnectionConfig) -> io::Result<Self> {
        // Receive primitive mengandalkan blocking read
        stream.set_nonblocking(false)?;

        // Disable Nagle's algorithm untuk lower latency
        stream.set_nodelay(config.nodelay)?;
        stream.set_read_timeout(config.read_timeout)?;

        if let Some(size) = config.socket_buffer_size {
            tune_socket_buffers(&stream, size);
        }

        let name = name.into();
        let peer_addr = stream.peer_addr().ok();
        let writer = stream.try_clone()?;
        let closer = stream.try_clone()?;

        log::debug!("connection `{}` opened (peer: {:?})", name, peer_addr);

        Ok(Self {
            name,
            reader: Mutex::new(stream),
            writer: Mutex::new(writer),
            closer,
            closed: AtomicBool::new(false),
            peer_addr,
            config,
        })
    }

    /// Connect ke `addr` lalu wrap
    pub fn connect<A: ToSocketAddrs>(addr: A, name: impl Into<String>, config: ConnectionConfig) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::new(stream, name, config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shutdown kedua arah. Reader yang sedang blocking akan gagal.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.closer.shutdown(Shutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                log::debug!("connection `{}` shutdown: {}", self.name, e);
            }
        }
        log::debug!("connection `{}` closed", self.name);
    }

    // === write side ===

    /// Tulis 4-byte big-endian header
    pub fn send_header(&self, len: i32) -> Result<(), TransportError> {
        self.send_bytes(&len.to_be_bytes())
    }

    /// Tulis payload apa adanya
    pub fn send_bytes(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut writer = lock(&self.writer, &self.name);
        writer.write_all(payload)?;
        writer.flush()?;
        Ok(())
    }

    /// Header + payload di bawah satu write lock
    pub fn send_framed(&self, payload: &[u8]) -> Result<(), TransportError> {
        let len = self.frame_len(payload.len())?;
        self.ensure_open()?;

        let mut writer = lock(&self.writer, &self.name);
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(payload)?;
        writer.flush()?;
        log::trace!("connection `{}` sent frame of {} bytes", self.name, payload.len());
        Ok(())
    }

    // === read side ===

    /// Baca sampai tepat 4 byte lalu convert ke i32
    pub fn receive_header(&self) -> Result<i32, TransportError> {
        self.ensure_open()?;
        let mut reader = lock(&self.reader, &self.name);
        self.read_header(&mut reader)
    }

    /// Baca sampai tepat `n` byte
    pub fn receive_exact(&self, n: usize) -> Result<Vec<u8>, TransportError> {
        self.ensure_open()?;
        let mut reader = lock(&self.reader, &self.name);
        self.read_exact_locked(&mut reader, n)
    }

    /// Header lalu payload, tanpa melepas read lock di antaranya
    pub fn receive_framed(&self) -> Result<Vec<u8>, TransportError> {
        self.ensure_open()?;
        let mut reader = lock(&self.reader, &self.name);

        let len = self.read_header(&mut reader)?;
        let len = self.check_frame_len(len)?;
        let payload = self.read_exact_locked(&mut reader, len)?;

        log::trace!("connection `{}` received frame of {} bytes", self.name, len);
        Ok(payload)
    }

    fn read_header(&self, reader: &mut TcpStream) -> Result<i32, TransportError> {
        let mut buf = [0u8; HEADER_SIZE];
        self.fill(reader, &mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_exact_locked(&self, reader: &mut TcpStream, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; n];
        self.fill(reader, &mut buf)?;
        Ok(buf)
    }

    /// Loop partial read sampai `buf` penuh
    fn fill(&self, reader: &mut TcpStream, buf: &mut [u8]) -> Result<(), TransportError> {
        let expected = buf.len();
        let mut received = 0;

        while received < expected {
            match reader.read(&mut buf[received..]) {
                Ok(0) => {
                    let cause = io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection");
                    return Err(self.truncated(received, expected, cause));
                }
                Ok(n) => received += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.truncated(received, expected, e)),
            }
        }
        Ok(())
    }

    fn truncated(&self, received: usize, expected: usize, cause: io::Error) -> TransportError {
        log::warn!(
            "connection `{}` truncated read: {} of {} bytes ({})",
            self.name,
            received,
            expected,
            cause
        );
        if self.config.close_on_truncated {
            self.close();
        }
        TransportError::Truncated {
            received,
            expected,
            cause,
        }
    }

    fn check_frame_len(&self, len: i32) -> Result<usize, TransportError> {
        match usize::try_from(len) {
            Ok(n) if n <= self.config.max_frame_len => Ok(n),
            _ => Err(TransportError::FrameTooLarge {
                len: i64::from(len),
                max: self.config.max_frame_len,
            }),
        }
    }

    fn frame_len(&self, len: usize) -> Result<i32, TransportError> {
        match i32::try_from(len) {
            Ok(n) if len <= self.config.max_frame_len => Ok(n),
            _ => Err(TransportError::FrameTooLarge {
                len: len as i64,
                max: self.config.max_frame_len,
            }),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed(self.name.clone()));
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Lock yang pulih dari poisoning; stream tetap valid walau thread lain panic
fn lock<'a>(mutex: &'a Mutex<TcpStream>, name: &str) -> MutexGuard<'a, TcpStream> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("connection `{}` lock poisoned, recovering", name);
        poisoned.into_inner()
    })
}

/// Set socket buffer sizes untuk throughput
/// Ignore errors - not all platforms support this
#[cfg(unix)]
fn tune_socket_buffers(stream: &TcpStream, size: usize) {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();
    let optval = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);
    for opt in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        // SAFETY: fd valid selama `stream` hidup, optval berukuran c_int
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                &optval as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            log::debug!("setsockopt({}) failed: {}", opt, io::Error::last_os_error());
        }
    }
}

#[cfg(not(unix))]
fn tune_socket_buffers(_stream: &TcpStream, _size: usize) {}
