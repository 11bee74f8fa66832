//! Message transport beneath the SFTP protocol session.
//!
//! SFTP messages travel as length-prefixed frames over a byte stream, usually
//! the data of an SSH channel running the `sftp` subsystem. [`StreamTransport`]
//! frames messages over any tokio reader/writer pair so the session can run
//! over a channel, a child process' stdio, or an in-memory duplex pipe.

use super::message::SftpMessage;
use skein_platform::{SkeinError, SkeinResult};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Sends and receives whole SFTP messages.
#[async_trait::async_trait]
pub trait SftpTransport: Send {
    /// Sends one message.
    async fn send(&mut self, msg: &SftpMessage) -> SkeinResult<()>;

    /// Receives the next message.
    async fn recv(&mut self) -> SkeinResult<SftpMessage>;
}

/// Length-prefixed framing over an async reader/writer pair.
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
    max_message_size: u32,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a transport that rejects frames larger than `max_message_size`.
    pub fn new(reader: R, writer: W, max_message_size: u32) -> Self {
        Self {
            reader,
            writer,
            max_message_size,
        }
    }

    /// Returns the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

#[async_trait::async_trait]
impl<R, W> SftpTransport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, msg: &SftpMessage) -> SkeinResult<()> {
        let frame = msg.to_bytes();
        if frame.len() - 4 > self.max_message_size as usize {
            return Err(SkeinError::Protocol(format!(
                "Outgoing SFTP message of {} bytes exceeds limit of {}",
                frame.len() - 4,
                self.max_message_size
            )));
        }

        trace!(msg_type = ?msg.msg_type, len = frame.len(), "Sending SFTP message");
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> SkeinResult<SftpMessage> {
        let length = self.reader.read_u32().await?;
        if length == 0 {
            return Err(SkeinError::Protocol("SFTP message has zero length".to_string()));
        }
        if length > self.max_message_size {
            return Err(SkeinError::Protocol(format!(
                "Incoming SFTP message of {} bytes exceeds limit of {}",
                length, self.max_message_size
            )));
        }

        let mut body = vec![0u8; length as usize];
        self.reader.read_exact(&mut body).await?;

        let msg = SftpMessage::from_body(&body)?;
        trace!(msg_type = ?msg.msg_type, len = length, "Received SFTP message");
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sftp::message::SftpMessageType;

    #[tokio::test]
    async fn test_frames_survive_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let (client_rx, client_tx) = tokio::io::split(client);
        let (server_rx, server_tx) = tokio::io::split(server);

        let mut client = StreamTransport::new(client_rx, client_tx, 1024);
        let mut server = StreamTransport::new(server_rx, server_tx, 1024);

        let msg = SftpMessage::new(SftpMessageType::Init, vec![0, 0, 0, 3]);
        client.send(&msg).await.unwrap();

        let received = server.recv().await.unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (client, server) = tokio::io::duplex(1024);
        let (_client_rx, mut client_tx) = tokio::io::split(client);
        let (server_rx, server_tx) = tokio::io::split(server);

        // Declares a 4 KiB body against a 64 byte limit
        client_tx.write_all(&4096u32.to_be_bytes()).await.unwrap();

        let mut server = StreamTransport::new(server_rx, server_tx, 64);
        let err = server.recv().await.unwrap_err();
        assert!(matches!(err, SkeinError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_closed_peer_is_io_error() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let (client_rx, client_tx) = tokio::io::split(client);

        let mut client = StreamTransport::new(client_rx, client_tx, 64);
        let err = client.recv().await.unwrap_err();
        assert!(matches!(err, SkeinError::Io(_)));
    }
}
