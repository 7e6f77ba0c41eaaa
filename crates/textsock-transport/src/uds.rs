use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::RawStream;

/// Unix domain socket transport.
///
/// Provides bind/accept/connect over filesystem-path UDS on Linux and macOS.
/// The socket file is removed on drop, unless the path was replaced by
/// something else in the meantime.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UnixDomainSocket {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    ///
    /// If the file already exists and is a socket, it is removed first
    /// (stale socket cleanup). Must be called within a Tokio runtime.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind and listen on a filesystem-path Unix domain socket with explicit mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            addr: path.display().to_string(),
            source,
        };

        // Remove stale socket if it exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            listener,
            created_inode: Some((created.dev(), created.ino())),
            path,
        })
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> Result<RawStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted unix connection");
        Ok(RawStream::from(stream))
    }

    /// Connect to a listening Unix domain socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<RawStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| TransportError::Connect {
                addr: path.display().to_string(),
                source: e,
            })?;
        debug!(?path, "connected to unix domain socket");
        Ok(RawStream::from(stream))
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "unix-domain-socket"
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
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

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("textsock-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_bind_accept_connect() {
        let dir = temp_dir("uds-basic");
        let sock_path = dir.join("test.sock");

        let listener = UnixDomainSocket::bind(&sock_path).unwrap();
        assert!(sock_path.exists());

        let path_clone = sock_path.clone();
        let client = tokio::spawn(async move {
            let mut client = UnixDomainSocket::connect(&path_clone).await.unwrap();
            client.write_all(b"hello").await.unwrap();
        });

        let mut server = listener.accept().await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        client.await.unwrap();

        drop(listener);
        assert!(
            !sock_path.exists(),
            "socket file should be cleaned up on drop"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixDomainSocket::bind(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[tokio::test]
    async fn test_bind_default_permissions_hardened() {
        let dir = temp_dir("uds-perms");
        let sock_path = dir.join("perm.sock");

        let listener = UnixDomainSocket::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_bind_rejects_existing_non_socket_file() {
        let dir = temp_dir("uds-file");
        let sock_path = dir.join("not-a-socket.sock");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = UnixDomainSocket::bind(&sock_path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_drop_does_not_remove_replaced_path() {
        let dir = temp_dir("uds-drop-race");
        let sock_path = dir.join("drop.sock");

        let listener = UnixDomainSocket::bind(&sock_path).unwrap();
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
