use std::net::TcpListener;
#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
#[cfg(unix)]
use std::os::unix::net::UnixListener;
#[cfg(unix)]
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::KernelStream;

/// Listening side of a kernel endpoint.
///
/// Kernels bind their sockets; clients connect. The listener exists so that
/// kernel-side tooling and tests can serve the protocol over the same
/// transports. Binding `tcp://host:0` picks a free port, reported by
/// [`KernelListener::endpoint`].
pub struct KernelListener {
    inner: ListenerInner,
    endpoint: Endpoint,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixSocketFile),
}

#[cfg(unix)]
struct UnixSocketFile {
    listener: UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
}

impl KernelListener {
    /// Default permission mode for created ipc socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum ipc socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on an endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp { host, .. } => {
                let addr = endpoint
                    .socket_addr_string()
                    .ok_or_else(|| TransportError::Unsupported(endpoint.to_string()))?;
                let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
                    endpoint: endpoint.to_string(),
                    source: e,
                })?;
                let port = listener.local_addr()?.port();
                let bound = Endpoint::tcp(host.clone(), port);
                info!(endpoint = %bound, "listening on tcp endpoint");
                Ok(Self {
                    inner: ListenerInner::Tcp(listener),
                    endpoint: bound,
                })
            }
            #[cfg(unix)]
            Endpoint::Ipc { path } => {
                let socket = bind_unix(path, Self::DEFAULT_SOCKET_MODE)?;
                info!(%endpoint, "listening on ipc endpoint");
                Ok(Self {
                    inner: ListenerInner::Unix(socket),
                    endpoint: endpoint.clone(),
                })
            }
            #[cfg(not(unix))]
            Endpoint::Ipc { .. } => Err(TransportError::Unsupported(endpoint.to_string())),
        }
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<KernelStream> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%addr, "accepted tcp connection");
                Ok(KernelStream::from_tcp(stream))
            }
            #[cfg(unix)]
            ListenerInner::Unix(socket) => {
                let (stream, _addr) = socket.listener.accept().map_err(TransportError::Accept)?;
                debug!("accepted ipc connection");
                Ok(KernelStream::from_unix(stream))
            }
        }
    }

    /// The endpoint this listener is bound to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(unix)]
fn bind_unix(path: &Path, mode: u32) -> Result<UnixSocketFile> {
    let bind_err = |source| TransportError::Bind {
        endpoint: format!("ipc://{}", path.display()),
        source,
    };

    let path_bytes = path.as_os_str().len();
    if path_bytes >= KernelListener::MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len: path_bytes,
            max: KernelListener::MAX_PATH_LEN,
        });
    }

    // Remove stale socket if it exists, but never remove non-socket files.
    if path.exists() {
        let metadata = std::fs::symlink_metadata(path).map_err(bind_err)?;
        if metadata.file_type().is_socket() {
            debug!(?path, "removing stale socket");
            std::fs::remove_file(path).map_err(bind_err)?;
        } else {
            return Err(bind_err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a unix socket",
            )));
        }
    }

    let listener = UnixListener::bind(path).map_err(bind_err)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(bind_err)?;
    let created = std::fs::symlink_metadata(path).map_err(bind_err)?;

    Ok(UnixSocketFile {
        listener,
        path: path.to_path_buf(),
        created_inode: (created.dev(), created.ino()),
    })
}

#[cfg(unix)]
impl Drop for UnixSocketFile {
    fn drop(&mut self) {
        let (expected_dev, expected_ino) = self.created_inode;
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}

impl std::fmt::Debug for KernelListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelListener")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "kernelwire-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn tcp_bind_reports_assigned_port() {
        let listener = KernelListener::bind(&Endpoint::tcp("127.0.0.1", 0)).unwrap();
        match listener.endpoint() {
            Endpoint::Tcp { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_ne!(*port, 0);
            }
            other => panic!("unexpected endpoint {other}"),
        }
    }

    #[test]
    fn tcp_bind_accept_connect() {
        let listener = KernelListener::bind(&Endpoint::tcp("127.0.0.1", 0)).unwrap();
        let endpoint = listener.endpoint().clone();

        let handle = std::thread::spawn(move || {
            let mut client = KernelStream::connect(&endpoint, None).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        handle.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn ipc_bind_accept_connect_and_cleanup() {
        let dir = temp_dir("ipc");
        let sock_path = dir.join("kernel-ipc-1");
        let endpoint = Endpoint::ipc(&sock_path);

        let listener = KernelListener::bind(&endpoint).unwrap();
        assert!(sock_path.exists());
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        let connect_to = endpoint.clone();
        let handle = std::thread::spawn(move || {
            let mut client = KernelStream::connect(&connect_to, None).unwrap();
            client.write_all(b"ping").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        handle.join().unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file should be cleaned up on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn ipc_path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200);
        let result = KernelListener::bind(&Endpoint::ipc(long_path));
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn ipc_bind_rejects_existing_non_socket_file() {
        let dir = temp_dir("ipc-file");
        let sock_path = dir.join("not-a-socket");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = KernelListener::bind(&Endpoint::ipc(&sock_path));
        assert!(matches!(result, Err(TransportError::Bind { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(unix)]
    fn drop_does_not_remove_replaced_path() {
        let dir = temp_dir("ipc-drop");
        let sock_path = dir.join("kernel-ipc-2");

        let listener = KernelListener::bind(&Endpoint::ipc(&sock_path)).unwrap();
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(listener);
        assert!(
            sock_path.exists(),
            "drop must not remove path if inode identity changed"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
