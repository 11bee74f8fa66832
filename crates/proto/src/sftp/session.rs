//! The session capability consumed by [`SftpFileStream`](super::SftpFileStream).

use super::types::{FileAttributes, FileOpenFlags};
use skein_platform::SkeinResult;
use std::fmt;

/// Opaque handle returned by the server for an open file.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FileHandle(Vec<u8>);

impl FileHandle {
    /// Wraps raw handle bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw handle bytes as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the handle in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the handle is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle(")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Request/response operations a file stream needs from an SFTP session.
///
/// Implementations surface failures; they do not retry. Each call is one
/// round trip as far as the caller is concerned.
#[async_trait::async_trait]
pub trait SftpSession: Send + Sync {
    /// Opens `path` with the given flags. Creation is requested through
    /// [`FileOpenFlags::CREAT`].
    async fn open(&self, path: &str, flags: FileOpenFlags) -> SkeinResult<FileHandle>;

    /// Reads up to `length` bytes at `offset`.
    ///
    /// An empty result means end of file. The result may be longer than
    /// `length`; callers must keep every returned byte.
    async fn read(&self, handle: &FileHandle, offset: u64, length: u32) -> SkeinResult<Vec<u8>>;

    /// Writes `data` at `offset`.
    async fn write(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> SkeinResult<()>;

    /// Releases `handle` on the server.
    async fn close(&self, handle: &FileHandle) -> SkeinResult<()>;

    /// Returns the attributes of the open file.
    async fn fstat(&self, handle: &FileHandle) -> SkeinResult<FileAttributes>;

    /// Whether the session is still usable.
    fn is_open(&self) -> bool;

    /// Largest read length that fits in one response given `requested`.
    fn optimal_read_length(&self, requested: u32) -> u32;

    /// Largest write length that fits in one request for `handle` given
    /// `requested`.
    fn optimal_write_length(&self, requested: u32, handle: &FileHandle) -> u32;
}
