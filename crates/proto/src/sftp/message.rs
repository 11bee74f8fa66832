//! SFTP protocol messages.
//!
//! Defines the message framing plus typed requests and responses for the
//! subset of SFTP v3 a file stream needs.

use super::types::{FileAttributes, FileOpenFlags, SftpError, SftpErrorCode};
use super::wire::{put_string, WireReader};
use bytes::{BufMut, BytesMut};
use skein_platform::{SkeinError, SkeinResult};

/// SFTP protocol version (v3).
pub const SFTP_VERSION: u32 = 3;

/// SFTP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SftpMessageType {
    /// SSH_FXP_INIT - Initialize SFTP session
    Init = 1,
    /// SSH_FXP_VERSION - Version response
    Version = 2,
    /// SSH_FXP_OPEN - Open file
    Open = 3,
    /// SSH_FXP_CLOSE - Close file/directory
    Close = 4,
    /// SSH_FXP_READ - Read from file
    Read = 5,
    /// SSH_FXP_WRITE - Write to file
    Write = 6,
    /// SSH_FXP_FSTAT - Get file attributes by handle
    FStat = 8,

    // Response messages
    /// SSH_FXP_STATUS - Status response
    Status = 101,
    /// SSH_FXP_HANDLE - File handle response
    Handle = 102,
    /// SSH_FXP_DATA - Data response
    Data = 103,
    /// SSH_FXP_ATTRS - Attributes response
    Attrs = 105,
}

impl SftpMessageType {
    /// Convert from u8.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Init),
            2 => Some(Self::Version),
            3 => Some(Self::Open),
            4 => Some(Self::Close),
            5 => Some(Self::Read),
            6 => Some(Self::Write),
            8 => Some(Self::FStat),
            101 => Some(Self::Status),
            102 => Some(Self::Handle),
            103 => Some(Self::Data),
            105 => Some(Self::Attrs),
            _ => None,
        }
    }
}

/// SFTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpMessage {
    /// Message type
    pub msg_type: SftpMessageType,
    /// Message payload
    pub payload: Vec<u8>,
}

impl SftpMessage {
    /// Creates a new SFTP message.
    pub fn new(msg_type: SftpMessageType, payload: Vec<u8>) -> Self {
        Self { msg_type, payload }
    }

    /// Length of the frame on the wire, including the length prefix.
    pub fn frame_len(&self) -> usize {
        4 + 1 + self.payload.len()
    }

    /// Serializes to bytes.
    ///
    /// Format:
    /// ```text
    /// uint32    length
    /// byte      type
    /// byte[n]   payload
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.frame_len());
        buf.put_u32((self.payload.len() + 1) as u32);
        buf.put_u8(self.msg_type as u8);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    /// Parses one frame from bytes.
    pub fn from_bytes(data: &[u8]) -> SkeinResult<Self> {
        if data.len() < 5 {
            return Err(SkeinError::Protocol("SFTP message too short".to_string()));
        }

        let length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if length == 0 {
            return Err(SkeinError::Protocol("SFTP message has zero length".to_string()));
        }
        if data.len() - 4 < length {
            return Err(SkeinError::Protocol("SFTP message incomplete".to_string()));
        }

        Self::from_body(&data[4..4 + length])
    }

    /// Parses a frame body (type byte plus payload, without the length).
    pub fn from_body(body: &[u8]) -> SkeinResult<Self> {
        let (&type_byte, payload) = body
            .split_first()
            .ok_or_else(|| SkeinError::Protocol("SFTP message body is empty".to_string()))?;

        let msg_type = SftpMessageType::from_u8(type_byte).ok_or_else(|| {
            SkeinError::Protocol(format!("Unknown SFTP message type: {}", type_byte))
        })?;

        Ok(Self {
            msg_type,
            payload: payload.to_vec(),
        })
    }
}

/// Client requests used by the protocol session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SftpRequest {
    /// SSH_FXP_INIT
    Init {
        /// Client protocol version
        version: u32,
    },
    /// SSH_FXP_OPEN
    Open {
        /// Request id
        id: u32,
        /// Remote path
        path: String,
        /// Open flags
        flags: FileOpenFlags,
        /// Attributes for a newly created file
        attrs: FileAttributes,
    },
    /// SSH_FXP_READ
    Read {
        /// Request id
        id: u32,
        /// File handle
        handle: Vec<u8>,
        /// Absolute offset
        offset: u64,
        /// Maximum bytes to return
        len: u32,
    },
    /// SSH_FXP_WRITE
    Write {
        /// Request id
        id: u32,
        /// File handle
        handle: Vec<u8>,
        /// Absolute offset
        offset: u64,
        /// Bytes to write
        data: Vec<u8>,
    },
    /// SSH_FXP_CLOSE
    Close {
        /// Request id
        id: u32,
        /// File handle
        handle: Vec<u8>,
    },
    /// SSH_FXP_FSTAT
    FStat {
        /// Request id
        id: u32,
        /// File handle
        handle: Vec<u8>,
    },
}

impl SftpRequest {
    /// Request id, or `None` for INIT which carries a version instead.
    pub fn id(&self) -> Option<u32> {
        match self {
            Self::Init { .. } => None,
            Self::Open { id, .. }
            | Self::Read { id, .. }
            | Self::Write { id, .. }
            | Self::Close { id, .. }
            | Self::FStat { id, .. } => Some(*id),
        }
    }

    /// Encodes into a framed message.
    pub fn to_message(&self) -> SftpMessage {
        let mut buf = BytesMut::new();
        let msg_type = match self {
            Self::Init { version } => {
                buf.put_u32(*version);
                SftpMessageType::Init
            }
            Self::Open {
                id,
                path,
                flags,
                attrs,
            } => {
                buf.put_u32(*id);
                put_string(&mut buf, path.as_bytes());
                buf.put_u32(flags.0);
                attrs.encode(&mut buf);
                SftpMessageType::Open
            }
            Self::Read {
                id,
                handle,
                offset,
                len,
            } => {
                buf.put_u32(*id);
                put_string(&mut buf, handle);
                buf.put_u64(*offset);
                buf.put_u32(*len);
                SftpMessageType::Read
            }
            Self::Write {
                id,
                handle,
                offset,
                data,
            } => {
                buf.put_u32(*id);
                put_string(&mut buf, handle);
                buf.put_u64(*offset);
                put_string(&mut buf, data);
                SftpMessageType::Write
            }
            Self::Close { id, handle } => {
                buf.put_u32(*id);
                put_string(&mut buf, handle);
                SftpMessageType::Close
            }
            Self::FStat { id, handle } => {
                buf.put_u32(*id);
                put_string(&mut buf, handle);
                SftpMessageType::FStat
            }
        };

        SftpMessage::new(msg_type, buf.to_vec())
    }

    /// Decodes a request message. Used by server-side peers and tests.
    pub fn from_message(msg: &SftpMessage) -> SkeinResult<Self> {
        let mut reader = WireReader::new(&msg.payload);
        let request = match msg.msg_type {
            SftpMessageType::Init => Self::Init {
                version: reader.read_u32("version")?,
            },
            SftpMessageType::Open => Self::Open {
                id: reader.read_u32("request id")?,
                path: reader.read_utf8_lossy("path")?,
                flags: FileOpenFlags(reader.read_u32("open flags")?),
                attrs: FileAttributes::decode(&mut reader)?,
            },
            SftpMessageType::Read => Self::Read {
                id: reader.read_u32("request id")?,
                handle: reader.read_string("handle")?.to_vec(),
                offset: reader.read_u64("offset")?,
                len: reader.read_u32("length")?,
            },
            SftpMessageType::Write => Self::Write {
                id: reader.read_u32("request id")?,
                handle: reader.read_string("handle")?.to_vec(),
                offset: reader.read_u64("offset")?,
                data: reader.read_string("data")?.to_vec(),
            },
            SftpMessageType::Close => Self::Close {
                id: reader.read_u32("request id")?,
                handle: reader.read_string("handle")?.to_vec(),
            },
            SftpMessageType::FStat => Self::FStat {
                id: reader.read_u32("request id")?,
                handle: reader.read_string("handle")?.to_vec(),
            },
            other => {
                return Err(SkeinError::Protocol(format!(
                    "{:?} is not a request",
                    other
                )))
            }
        };
        Ok(request)
    }
}

/// Server responses understood by the protocol session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SftpResponse {
    /// SSH_FXP_VERSION
    Version {
        /// Server protocol version
        version: u32,
    },
    /// SSH_FXP_STATUS
    Status {
        /// Request id
        id: u32,
        /// Status code
        code: u32,
        /// Error message
        message: String,
    },
    /// SSH_FXP_HANDLE
    Handle {
        /// Request id
        id: u32,
        /// Opaque handle
        handle: Vec<u8>,
    },
    /// SSH_FXP_DATA
    Data {
        /// Request id
        id: u32,
        /// File bytes
        data: Vec<u8>,
    },
    /// SSH_FXP_ATTRS
    Attrs {
        /// Request id
        id: u32,
        /// File attributes
        attrs: FileAttributes,
    },
}

impl SftpResponse {
    /// Request id this response answers, or `None` for VERSION.
    pub fn id(&self) -> Option<u32> {
        match self {
            Self::Version { .. } => None,
            Self::Status { id, .. }
            | Self::Handle { id, .. }
            | Self::Data { id, .. }
            | Self::Attrs { id, .. } => Some(*id),
        }
    }

    /// Converts a STATUS response into a result.
    ///
    /// `SSH_FX_OK` is success; anything else becomes an [`SftpError`].
    pub fn status_result(code: u32, message: &str) -> Result<(), SftpError> {
        if code == SftpErrorCode::Ok as u32 {
            Ok(())
        } else {
            Err(SftpError::new(code, message))
        }
    }

    /// Decodes a response message.
    pub fn from_message(msg: &SftpMessage) -> SkeinResult<Self> {
        let mut reader = WireReader::new(&msg.payload);
        let response = match msg.msg_type {
            SftpMessageType::Version => Self::Version {
                version: reader.read_u32("version")?,
            },
            SftpMessageType::Status => {
                let id = reader.read_u32("request id")?;
                let code = reader.read_u32("status code")?;
                // Some v3 servers omit the message and language tag
                let message = if reader.remaining() > 0 {
                    reader.read_utf8_lossy("status message")?
                } else {
                    String::new()
                };
                Self::Status { id, code, message }
            }
            SftpMessageType::Handle => Self::Handle {
                id: reader.read_u32("request id")?,
                handle: reader.read_string("handle")?.to_vec(),
            },
            SftpMessageType::Data => Self::Data {
                id: reader.read_u32("request id")?,
                data: reader.read_string("data")?.to_vec(),
            },
            SftpMessageType::Attrs => Self::Attrs {
                id: reader.read_u32("request id")?,
                attrs: FileAttributes::decode(&mut reader)?,
            },
            other => {
                return Err(SkeinError::Protocol(format!(
                    "{:?} is not a response",
                    other
                )))
            }
        };
        Ok(response)
    }

    /// Encodes into a framed message. Used by server-side peers and tests.
    pub fn to_message(&self) -> SftpMessage {
        let mut buf = BytesMut::new();
        let msg_type = match self {
            Self::Version { version } => {
                buf.put_u32(*version);
                SftpMessageType::Version
            }
            Self::Status { id, code, message } => {
                buf.put_u32(*id);
                buf.put_u32(*code);
                put_string(&mut buf, message.as_bytes());
                put_string(&mut buf, b"en");
                SftpMessageType::Status
            }
            Self::Handle { id, handle } => {
                buf.put_u32(*id);
                put_string(&mut buf, handle);
                SftpMessageType::Handle
            }
            Self::Data { id, data } => {
                buf.put_u32(*id);
                put_string(&mut buf, data);
                SftpMessageType::Data
            }
            Self::Attrs { id, attrs } => {
                buf.put_u32(*id);
                attrs.encode(&mut buf);
                SftpMessageType::Attrs
            }
        };

        SftpMessage::new(msg_type, buf.to_vec())
    }
}
