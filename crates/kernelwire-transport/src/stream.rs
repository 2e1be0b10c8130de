use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// A connected kernel stream implementing Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// Over `tcp` endpoints it wraps a TCP stream; over `ipc` endpoints it wraps
/// a Unix domain socket stream.
pub struct KernelStream {
    inner: KernelStreamInner,
}

enum KernelStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for KernelStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            KernelStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            KernelStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for KernelStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            KernelStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            KernelStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            KernelStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            KernelStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl KernelStream {
    /// Connect to a kernel endpoint (blocking).
    ///
    /// `timeout` bounds the TCP connect; ipc connects complete or fail immediately.
    pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Self> {
        let connect_err = |source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        match endpoint {
            Endpoint::Tcp { .. } => {
                let addr = endpoint
                    .socket_addr_string()
                    .ok_or_else(|| TransportError::Unsupported(endpoint.to_string()))?;
                let addrs = addr.to_socket_addrs().map_err(connect_err)?;

                let mut last_err = None;
                for candidate in addrs {
                    let attempt = match timeout {
                        Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                        None => TcpStream::connect(candidate),
                    };
                    match attempt {
                        Ok(stream) => {
                            stream.set_nodelay(true)?;
                            debug!(%endpoint, "connected to tcp endpoint");
                            return Ok(Self::from_tcp(stream));
                        }
                        Err(err) => last_err = Some(err),
                    }
                }
                Err(connect_err(last_err.unwrap_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::AddrNotAvailable,
                        "endpoint resolved to no addresses",
                    )
                })))
            }
            #[cfg(unix)]
            Endpoint::Ipc { path } => {
                let stream =
                    std::os::unix::net::UnixStream::connect(path).map_err(connect_err)?;
                debug!(%endpoint, "connected to ipc endpoint");
                Ok(Self::from_unix(stream))
            }
            #[cfg(not(unix))]
            Endpoint::Ipc { .. } => Err(TransportError::Unsupported(endpoint.to_string())),
        }
    }

    /// Create a KernelStream from a TCP stream.
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: KernelStreamInner::Tcp(stream),
        }
    }

    /// Create a KernelStream from a Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: KernelStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            KernelStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            KernelStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            KernelStreamInner::Tcp(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            #[cfg(unix)]
            KernelStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            KernelStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            #[cfg(unix)]
            KernelStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
        }
    }

    /// Shut down both halves of the connection.
    ///
    /// Blocked reads on any clone of this stream return end-of-stream.
    pub fn shutdown(&self) -> Result<()> {
        let res = match &self.inner {
            KernelStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            KernelStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match res {
            Ok(()) => Ok(()),
            // Already closed by the peer.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            KernelStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            KernelStreamInner::Unix(_) => "ipc",
        }
    }
}

impl std::fmt::Debug for KernelStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            KernelStreamInner::Tcp(stream) => f
                .debug_struct("KernelStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
            #[cfg(unix)]
            KernelStreamInner::Unix(_) => {
                f.debug_struct("KernelStream").field("type", &"ipc").finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn tcp_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&buf).unwrap();
        });

        let endpoint = Endpoint::tcp("127.0.0.1", port);
        let mut stream =
            KernelStream::connect(&endpoint, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(stream.transport_name(), "tcp");
        stream.write_all(b"hello").unwrap();
        let mut echoed = [0u8; 5];
        stream.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"hello");

        server.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_endpoint() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint = Endpoint::tcp("127.0.0.1", port);
        let err = KernelStream::connect(&endpoint, Some(Duration::from_millis(200))).unwrap_err();
        match err {
            TransportError::Connect { endpoint, .. } => {
                assert_eq!(endpoint, format!("tcp://127.0.0.1:{port}"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn shutdown_unblocks_cloned_reader() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = KernelStream::from_unix(left);
        let mut reader = stream.try_clone().unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read(&mut buf).unwrap_or(0)
        });

        std::thread::sleep(Duration::from_millis(20));
        stream.shutdown().unwrap();
        assert_eq!(handle.join().unwrap(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn read_timeout_applies() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut stream = KernelStream::from_unix(left);
        stream
            .set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        let mut buf = [0u8; 1];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }
}
