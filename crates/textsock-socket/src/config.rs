use std::sync::Arc;

use textsock_codec::{SharedEncoding, Utf8};

/// Default number of bytes requested per raw read: 8 KiB.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Configuration fixed for a socket's lifetime.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Encoding used for both directions. Default: UTF-8.
    pub encoding: SharedEncoding,
    /// Upper bound on bytes requested per raw read. Default: 8 KiB.
    pub read_buffer_size: usize,
}

impl SocketConfig {
    /// Default configuration with a different encoding.
    pub fn with_encoding(encoding: SharedEncoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            encoding: Arc::new(Utf8),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}
