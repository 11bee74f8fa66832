//! SFTP v3 session over a message transport.
//!
//! [`ProtocolSession`] implements [`SftpSession`] by exchanging SFTP messages
//! with a server. Each operation is one request and the matching response;
//! requests are serialized on the transport, so responses always arrive in
//! request order.

use super::config::{SessionConfig, DATA_RESPONSE_OVERHEAD, WRITE_REQUEST_OVERHEAD};
use super::message::{SftpMessage, SftpRequest, SftpResponse, SFTP_VERSION};
use super::session::{FileHandle, SftpSession};
use super::transport::SftpTransport;
use super::types::{FileAttributes, FileOpenFlags, SftpErrorCode};
use skein_platform::{SkeinError, SkeinResult};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// SFTP session bound to one transport.
pub struct ProtocolSession<T> {
    transport: Mutex<T>,
    config: SessionConfig,
    next_request_id: AtomicU32,
    open: AtomicBool,
    server_version: u32,
}

impl<T: SftpTransport> ProtocolSession<T> {
    /// Performs the INIT/VERSION handshake and returns a ready session.
    pub async fn connect(mut transport: T, config: SessionConfig) -> SkeinResult<Self> {
        config.validate()?;
        debug!("Initializing SFTP protocol");

        let init = SftpRequest::Init {
            version: SFTP_VERSION,
        };
        let reply = exchange(&mut transport, &init.to_message()).await?;

        let server_version = match SftpResponse::from_message(&reply)? {
            SftpResponse::Version { version } => version,
            other => {
                return Err(SkeinError::Protocol(format!(
                    "Expected VERSION, got {:?}",
                    other
                )))
            }
        };

        info!(server_version, "SFTP protocol initialized");

        Ok(Self {
            transport: Mutex::new(transport),
            config,
            next_request_id: AtomicU32::new(1),
            open: AtomicBool::new(true),
            server_version,
        })
    }

    /// Protocol version announced by the server.
    pub fn server_version(&self) -> u32 {
        self.server_version
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Marks the session closed. Later requests fail with
    /// [`SkeinError::SessionClosed`].
    pub fn shutdown(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("SFTP session shut down");
        }
    }

    /// Gets the next request ID.
    fn next_request_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn request(&self, build: impl FnOnce(u32) -> SftpRequest) -> SkeinResult<SftpResponse> {
        if !self.is_open() {
            return Err(SkeinError::SessionClosed);
        }

        let id = self.next_request_id();
        let request = build(id);

        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.send(&request.to_message()).await {
            return Err(self.transport_failed(id, e));
        }

        loop {
            let reply = match transport.recv().await {
                Ok(reply) => reply,
                Err(e) => return Err(self.transport_failed(id, e)),
            };

            let response = SftpResponse::from_message(&reply)?;
            match response.id() {
                Some(reply_id) if reply_id == id => return Ok(response),
                // Reply to a request whose caller stopped waiting
                Some(reply_id) if reply_id < id => {
                    debug!(request_id = id, reply_id, "Discarding stale SFTP reply");
                }
                reply_id => {
                    warn!(request_id = id, ?reply_id, "SFTP reply out of sequence; closing session");
                    self.open.store(false, Ordering::SeqCst);
                    return Err(SkeinError::Protocol(format!(
                        "Response id {:?} does not match request id {}",
                        reply_id, id
                    )));
                }
            }
        }
    }

    fn transport_failed(&self, request_id: u32, error: SkeinError) -> SkeinError {
        warn!(request_id, error = %error, "SFTP transport failed; closing session");
        self.open.store(false, Ordering::SeqCst);
        error
    }
}

async fn exchange<T: SftpTransport + ?Sized>(
    transport: &mut T,
    msg: &SftpMessage,
) -> SkeinResult<SftpMessage> {
    transport.send(msg).await?;
    transport.recv().await
}

fn unexpected(op: &str, response: &SftpResponse) -> SkeinError {
    SkeinError::Protocol(format!("Unexpected response to {}: {:?}", op, response))
}

fn status_error(op: &str, code: u32, message: &str) -> SkeinError {
    match SftpResponse::status_result(code, message) {
        Err(e) => e.into(),
        Ok(()) => SkeinError::Protocol(format!("Server answered {} with a bare OK status", op)),
    }
}

#[async_trait::async_trait]
impl<T: SftpTransport> SftpSession for ProtocolSession<T> {
    async fn open(&self, path: &str, flags: FileOpenFlags) -> SkeinResult<FileHandle> {
        let response = self
            .request(|id| SftpRequest::Open {
                id,
                path: path.to_string(),
                flags,
                attrs: FileAttributes::new(),
            })
            .await?;

        match response {
            SftpResponse::Handle { handle, .. } => Ok(FileHandle::new(handle)),
            SftpResponse::Status { code, message, .. } => Err(status_error("OPEN", code, &message)),
            other => Err(unexpected("OPEN", &other)),
        }
    }

    async fn read(&self, handle: &FileHandle, offset: u64, length: u32) -> SkeinResult<Vec<u8>> {
        let response = self
            .request(|id| SftpRequest::Read {
                id,
                handle: handle.as_bytes().to_vec(),
                offset,
                len: length,
            })
            .await?;

        match response {
            SftpResponse::Data { data, .. } => Ok(data),
            SftpResponse::Status { code, .. } if code == SftpErrorCode::Eof as u32 => Ok(Vec::new()),
            SftpResponse::Status { code, message, .. } => Err(status_error("READ", code, &message)),
            other => Err(unexpected("READ", &other)),
        }
    }

    async fn write(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> SkeinResult<()> {
        let response = self
            .request(|id| SftpRequest::Write {
                id,
                handle: handle.as_bytes().to_vec(),
                offset,
                data: data.to_vec(),
            })
            .await?;

        match response {
            SftpResponse::Status { code, message, .. } => {
                SftpResponse::status_result(code, &message).map_err(Into::into)
            }
            other => Err(unexpected("WRITE", &other)),
        }
    }

    async fn close(&self, handle: &FileHandle) -> SkeinResult<()> {
        let response = self
            .request(|id| SftpRequest::Close {
                id,
                handle: handle.as_bytes().to_vec(),
            })
            .await?;

        match response {
            SftpResponse::Status { code, message, .. } => {
                SftpResponse::status_result(code, &message).map_err(Into::into)
            }
            other => Err(unexpected("CLOSE", &other)),
        }
    }

    async fn fstat(&self, handle: &FileHandle) -> SkeinResult<FileAttributes> {
        let response = self
            .request(|id| SftpRequest::FStat {
                id,
                handle: handle.as_bytes().to_vec(),
            })
            .await?;

        match response {
            SftpResponse::Attrs { attrs, .. } => Ok(attrs),
            SftpResponse::Status { code, message, .. } => {
                Err(status_error("FSTAT", code, &message))
            }
            other => Err(unexpected("FSTAT", &other)),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn optimal_read_length(&self, requested: u32) -> u32 {
        requested
            .min(self.config.local_packet_size)
            .saturating_sub(DATA_RESPONSE_OVERHEAD)
            .max(1)
    }

    fn optimal_write_length(&self, requested: u32, handle: &FileHandle) -> u32 {
        let overhead = WRITE_REQUEST_OVERHEAD.saturating_add(handle.len() as u32);
        requested
            .min(self.config.remote_packet_size)
            .saturating_sub(overhead)
            .max(1)
    }
}
