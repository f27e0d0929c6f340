//! Listener dengan accept yang bisa di-timeout
//!
//! Menggunakan mio supaya accept loop bisa mengecek shutdown flag secara
//! berkala tanpa blocking selamanya di `accept()`. Stream yang diterima
//! dikembalikan ke mode blocking dan dibungkus sebagai `Connection`.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mio::net::TcpListener as MioTcpListener;
use mio::{Events, Interest, Poll, Token};

use super::connection::{Connection, ConnectionConfig, ConnectionNamer};

const LISTENER_TOKEN: Token = Token(0);
const EVENTS_CAPACITY: usize = 64;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Config untuk setiap connection yang diterima
    pub connection: ConnectionConfig,
    /// Batas wait per accept di `serve` (granularity cek shutdown flag)
    pub accept_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            accept_timeout: Duration::from_millis(100),
        }
    }
}

/// Accepts inbound peers sebagai named `Connection`
pub struct Listener {
    poll: Poll,
    events: Events,
    listener: MioTcpListener,
    namer: ConnectionNamer,
    config: ListenerConfig,
}

impl Listener {
    /// Bind dan register ke poller
    pub fn bind(addr: SocketAddr, namer: ConnectionNamer, config: ListenerConfig) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = MioTcpListener::bind(addr)?;

        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        log::info!("listening on {}", listener.local_addr()?);

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            namer,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Terima satu peer, atau `None` jika `timeout` habis
    pub fn accept_timeout(&mut self, timeout: Duration) -> io::Result<Option<Connection>> {
        let deadline = Instant::now() + timeout;

        loop {
            // Selalu coba accept dulu: readiness mio edge-triggered
            match self.listener.accept() {
                Ok((stream, addr)) => return self.adopt(stream, addr).map(Some),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            match self.poll.poll(&mut self.events, Some(deadline - now)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Accept loop sampai `running == false`
    ///
    /// Setiap peer diserahkan ke `handler`. Error saat setup satu peer
    /// di-log lalu loop lanjut.
    pub fn serve<F>(&mut self, running: &AtomicBool, mut handler: F) -> io::Result<()>
    where
        F: FnMut(Connection),
    {
        let interval = self.config.accept_timeout;
        while running.load(Ordering::Acquire) {
            match self.accept_timeout(interval) {
                Ok(Some(connection)) => handler(connection),
                Ok(None) => {}
                Err(e) if is_peer_error(&e) => {
                    log::warn!("failed to set up peer: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn adopt(&self, stream: mio::net::TcpStream, addr: SocketAddr) -> io::Result<Connection> {
        let stream = into_std(stream);
        let name = self.namer.next_name();
        log::debug!("accepted {} as `{}`", addr, name);
        Connection::new(stream, name, self.config.connection.clone())
    }
}

/// Error yang hanya mengenai satu peer, bukan listener-nya
fn is_peer_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected
    )
}

#[cfg(unix)]
fn into_std(stream: mio::net::TcpStream) -> TcpStream {
    use std::os::unix::io::{FromRawFd, IntoRawFd};
    // SAFETY: ownership fd dipindah dari mio stream ke std stream
    unsafe { TcpStream::from_raw_fd(stream.into_raw_fd()) }
}

#[cfg(windows)]
fn into_std(stream: mio::net::TcpStream) -> TcpStream {
    use std::os::windows::io::{FromRawSocket, IntoRawSocket};
    // SAFETY: ownership socket dipindah dari mio stream ke std stream
    unsafe { TcpStream::from_raw_socket(stream.into_raw_socket()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> Listener {
        Listener::bind(
            "127.0.0.1:0".parse().unwrap(),
            ConnectionNamer::new("peer-"),
            ListenerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_accept_times_out() {
        let mut listener = listener();
        let start = Instant::now();
        assert!(listener
            .accept_timeout(Duration::from_millis(30))
            .unwrap()
            .is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_accepted_peers_are_named_in_order() {
        let mut listener = listener();
        let addr = listener.local_addr().unwrap();

        let _a = TcpStream::connect(addr).unwrap();
        let first = listener
            .accept_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();
        let _b = TcpStream::connect(addr).unwrap();
        let second = listener
            .accept_timeout(Duration::from_secs(5))
            .unwrap()
            .unwrap();

        assert_eq!(first.name(), "peer-0");
        assert_eq!(second.name(), "peer-1");
    }
}
