//! SFTP (SSH File Transfer Protocol) client file access.
//!
//! This module implements the client side of SFTP v3, the most widely
//! supported version, and a buffered stream over remote files.
//!
//! # Architecture
//!
//! ```text
//! SftpFileStream      buffered read/write/seek over one remote handle
//!       |
//! SftpSession         open / read / write / close / fstat (trait)
//!       |
//! ProtocolSession     SFTP v3 requests and responses
//!       |
//! SftpTransport       length-prefixed frames over a byte stream
//! ```
//!
//! The stream only depends on the [`SftpSession`] trait, so it can run on
//! top of [`ProtocolSession`] or any other implementation.
//!
//! # Protocol Flow
//!
//! ```text
//! Client                          Server
//!   |-- SSH_FXP_INIT -------------->|
//!   |<- SSH_FXP_VERSION ------------|
//!   |                               |
//!   |-- SSH_FXP_OPEN -------------->|
//!   |<- SSH_FXP_HANDLE -------------|
//!   |                               |
//!   |-- SSH_FXP_READ -------------->|
//!   |<- SSH_FXP_DATA ---------------|
//!   |                               |
//!   |-- SSH_FXP_CLOSE ------------->|
//!   |<- SSH_FXP_STATUS -------------|
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use skein_proto::sftp::{
//!     FileAccess, OpenMode, ProtocolSession, SessionConfig, SftpFileStream, StreamTransport,
//! };
//! use std::sync::Arc;
//!
//! # async fn example<R, W>(reader: R, writer: W) -> Result<(), Box<dyn std::error::Error>>
//! # where
//! #     R: tokio::io::AsyncRead + Unpin + Send + 'static,
//! #     W: tokio::io::AsyncWrite + Unpin + Send + 'static,
//! # {
//! let config = SessionConfig::default();
//! let transport = StreamTransport::new(reader, writer, config.max_message_size);
//! let session = Arc::new(ProtocolSession::connect(transport, config).await?);
//!
//! let mut file = SftpFileStream::open(
//!     Arc::clone(&session),
//!     "/remote/file.txt",
//!     OpenMode::Open,
//!     FileAccess::Read,
//! )
//! .await?;
//!
//! let mut buf = vec![0u8; 4096];
//! let n = file.read(&mut buf).await?;
//! println!("read {} bytes", n);
//! file.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [SFTP Draft v3](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02) - Most common version

pub mod config;
pub mod file_stream;
pub mod message;
pub mod protocol_session;
pub mod session;
pub mod transport;
pub mod types;
mod wire;

pub use config::{FileStreamConfig, SessionConfig, SessionConfigBuilder};
pub use file_stream::SftpFileStream;
pub use message::{SftpMessage, SftpMessageType, SftpRequest, SftpResponse, SFTP_VERSION};
pub use protocol_session::ProtocolSession;
pub use session::{FileHandle, SftpSession};
pub use transport::{SftpTransport, StreamTransport};
pub use types::{
    open_flags, FileAccess, FileAttributes, FileMode, FileOpenFlags, OpenMode, SftpError,
    SftpErrorCode,
};
