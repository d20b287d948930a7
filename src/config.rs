//! Configuration for WebSocket connections.

/// WebSocket connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Chunk size for outgoing messages (in bytes).
    ///
    /// Messages larger than this are split into multiple frames so that no
    /// more than one chunk is buffered at a time, regardless of message size.
    ///
    /// Default: 16 KB (16 * 1024)
    pub write_chunk_size: usize,

    /// Read buffer size (in bytes).
    ///
    /// Upper bound on a single read from the underlying stream.
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Disable Nagle's algorithm on TCP transports.
    ///
    /// Applied by [`WebSocket::from_tcp`](crate::WebSocket::from_tcp) so
    /// small request/response frames are not delayed for coalescing.
    ///
    /// Default: true
    pub tcp_nodelay: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_chunk_size: 16 * 1024,
            read_buffer_size: 8192,
            tcp_nodelay: true,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk size for outgoing messages.
    #[must_use]
    pub const fn with_write_chunk_size(mut self, size: usize) -> Self {
        self.write_chunk_size = size;
        self
    }

    /// Set the read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Enable or disable Nagle's algorithm on TCP transports.
    #[must_use]
    pub const fn with_tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.tcp_nodelay = nodelay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.write_chunk_size, 16 * 1024);
        assert_eq!(config.read_buffer_size, 8192);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .with_write_chunk_size(4096)
            .with_read_buffer_size(1024)
            .with_tcp_nodelay(false);

        assert_eq!(config.write_chunk_size, 4096);
        assert_eq!(config.read_buffer_size, 1024);
        assert!(!config.tcp_nodelay);
    }
}
