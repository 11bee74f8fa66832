//! SFTP session and file stream configuration
//!
//! Provides configuration structures and builders for [`ProtocolSession`]
//! and [`SftpFileStream`].
//!
//! [`ProtocolSession`]: super::ProtocolSession
//! [`SftpFileStream`]: super::SftpFileStream

use skein_platform::{SkeinError, SkeinResult};

/// Protocol bytes around the payload of an SSH_FXP_DATA response.
pub(crate) const DATA_RESPONSE_OVERHEAD: u32 = 13;

/// Protocol bytes around the payload of an SSH_FXP_WRITE request, excluding
/// the handle itself.
pub(crate) const WRITE_REQUEST_OVERHEAD: u32 = 25;

/// Default stream buffer size requested from the session (32 KiB).
pub const DEFAULT_BUFFER_SIZE: u32 = 32 * 1024;

/// Default SSH channel packet size (32 KiB).
pub const DEFAULT_PACKET_SIZE: u32 = 32 * 1024;

/// Default upper bound on a single SFTP message (256 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 256 * 1024;

/// Per-stream configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStreamConfig {
    /// Buffer size requested from the session when negotiating read and write
    /// lengths. The session may lower it to fit its packet limits.
    pub buffer_size: u32,
}

impl Default for FileStreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl FileStreamConfig {
    /// Config with the given buffer size.
    pub fn with_buffer_size(buffer_size: u32) -> Self {
        Self { buffer_size }
    }

    /// Validate configuration
    pub fn validate(&self) -> SkeinResult<()> {
        if self.buffer_size == 0 {
            return Err(SkeinError::Config("buffer_size must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration for a [`ProtocolSession`](super::ProtocolSession).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Largest packet this side accepts on the channel. Bounds read lengths.
    pub local_packet_size: u32,

    /// Largest packet the server accepts on the channel. Bounds write lengths.
    pub remote_packet_size: u32,

    /// Largest SFTP message the transport will accept.
    pub max_message_size: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_packet_size: DEFAULT_PACKET_SIZE,
            remote_packet_size: DEFAULT_PACKET_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfig {
    /// Create builder for session configuration
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> SkeinResult<()> {
        if self.local_packet_size <= DATA_RESPONSE_OVERHEAD {
            return Err(SkeinError::Config(format!(
                "local_packet_size must exceed {} bytes",
                DATA_RESPONSE_OVERHEAD
            )));
        }
        if self.remote_packet_size <= WRITE_REQUEST_OVERHEAD {
            return Err(SkeinError::Config(format!(
                "remote_packet_size must exceed {} bytes",
                WRITE_REQUEST_OVERHEAD
            )));
        }
        if self.max_message_size < self.local_packet_size.max(self.remote_packet_size) {
            return Err(SkeinError::Config(
                "max_message_size must be at least the larger packet size".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for SessionConfig
#[derive(Default)]
pub struct SessionConfigBuilder {
    local_packet_size: Option<u32>,
    remote_packet_size: Option<u32>,
    max_message_size: Option<u32>,
}

impl SessionConfigBuilder {
    /// Create new session builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local packet size
    pub fn with_local_packet_size(mut self, size: u32) -> Self {
        self.local_packet_size = Some(size);
        self
    }

    /// Set the remote packet size
    pub fn with_remote_packet_size(mut self, size: u32) -> Self {
        self.remote_packet_size = Some(size);
        self
    }

    /// Set the maximum message size
    pub fn with_max_message_size(mut self, size: u32) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Build SessionConfig with validation
    pub fn build(self) -> SkeinResult<SessionConfig> {
        let defaults = SessionConfig::default();
        let config = SessionConfig {
            local_packet_size: self.local_packet_size.unwrap_or(defaults.local_packet_size),
            remote_packet_size: self
                .remote_packet_size
                .unwrap_or(defaults.remote_packet_size),
            max_message_size: self.max_message_size.unwrap_or(defaults.max_message_size),
        };

        config.validate()?;
        Ok(config)
    }
}
