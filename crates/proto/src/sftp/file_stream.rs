//! Buffered, seekable stream over a remote SFTP file.
//!
//! [`SftpFileStream`] keeps one absolute position and at most one buffer:
//!
//! ```text
//!              position
//!                 |
//! Reading:  [start ....... offset ........ start+len)   read-ahead window
//! Writing:  [start ................ position)            write-behind window
//! Idle:     no buffered bytes
//! ```
//!
//! Reads are served from the read-ahead window and refilled with one remote
//! read per miss. Writes accumulate until the negotiated write length would
//! be exceeded, a seek or read needs the position to be durable, or the
//! stream is flushed or closed. Switching from reading to writing discards
//! the read-ahead window; switching from writing to reading flushes first.
//!
//! The remote handle is opened when the stream is created and closed exactly
//! once by [`SftpFileStream::close`]. A stream dropped while still open
//! spawns a best-effort flush-and-close on the current tokio runtime.

use super::config::FileStreamConfig;
use super::session::{FileHandle, SftpSession};
use super::types::{open_flags, FileAccess, OpenMode};
use skein_platform::{SkeinError, SkeinResult};
use std::io::SeekFrom;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Bytes fetched from the server that have not all been delivered yet.
#[derive(Debug)]
struct ReadBuffer {
    /// Absolute offset of `data[0]`.
    start: u64,
    data: Vec<u8>,
    /// Index of the next byte to deliver.
    offset: usize,
}

impl ReadBuffer {
    fn new(start: u64, data: Vec<u8>) -> Self {
        Self {
            start,
            data,
            offset: 0,
        }
    }

    fn unread(&self) -> usize {
        self.data.len() - self.offset
    }

    fn is_exhausted(&self) -> bool {
        self.unread() == 0
    }

    /// Copies as many unread bytes as fit into `dst`.
    fn consume(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.unread());
        dst[..n].copy_from_slice(&self.data[self.offset..self.offset + n]);
        self.offset += n;
        n
    }

    fn end(&self) -> u64 {
        self.start.saturating_add(self.data.len() as u64)
    }

    /// Whether `position` can be reached by moving the cursor alone.
    fn covers(&self, position: u64) -> bool {
        position >= self.start && position <= self.end()
    }

    fn move_to(&mut self, position: u64) {
        self.offset = (position - self.start) as usize;
    }
}

/// Bytes written by the caller but not yet sent to the server.
#[derive(Debug)]
struct WriteBuffer {
    /// Absolute offset of `data[0]`.
    start: u64,
    data: Vec<u8>,
}

impl WriteBuffer {
    fn new(start: u64, capacity: usize) -> Self {
        Self {
            start,
            data: Vec::with_capacity(capacity),
        }
    }
}

/// Which buffer, if any, holds valid bytes.
#[derive(Debug, Default)]
enum BufferMode {
    #[default]
    Idle,
    Reading(ReadBuffer),
    Writing(WriteBuffer),
}

/// A remote file presented as a buffered, seekable byte stream.
///
/// All operations take `&mut self`; a stream is driven by one task at a
/// time. The session may be shared by any number of streams.
pub struct SftpFileStream<S: SftpSession + ?Sized + 'static> {
    session: Arc<S>,
    path: String,
    access: FileAccess,
    config: FileStreamConfig,
    /// `None` once the stream is closed.
    handle: Option<FileHandle>,
    position: u64,
    mode: BufferMode,
    read_length: Option<u32>,
    write_length: Option<u32>,
}

impl<S: SftpSession + ?Sized + 'static> SftpFileStream<S> {
    /// Opens `path` with the default buffer size.
    pub async fn open(
        session: Arc<S>,
        path: impl Into<String>,
        mode: OpenMode,
        access: FileAccess,
    ) -> SkeinResult<Self> {
        Self::open_with_config(session, path, mode, access, FileStreamConfig::default()).await
    }

    /// Opens `path` on the server and returns a stream positioned at its
    /// start, or at its end for [`OpenMode::Append`].
    ///
    /// Read and write lengths are negotiated with the session lazily, on the
    /// first read and first write respectively.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a mode/access combination that cannot be
    /// honoured, `Config` for an invalid buffer size, and whatever the
    /// session reports if the open (or, for append, the size query) fails.
    pub async fn open_with_config(
        session: Arc<S>,
        path: impl Into<String>,
        mode: OpenMode,
        access: FileAccess,
        config: FileStreamConfig,
    ) -> SkeinResult<Self> {
        config.validate()?;
        let flags = open_flags(mode, access)?;
        let path = path.into();

        let handle = session.open(&path, flags).await?;
        info!(path = %path, ?handle, flags = flags.0, "Opened remote file");

        let mut stream = Self {
            session,
            path,
            access,
            config,
            handle: Some(handle),
            position: 0,
            mode: BufferMode::Idle,
            read_length: None,
            write_length: None,
        };

        if mode == OpenMode::Append {
            match stream.remote_size().await {
                Ok(size) => stream.position = size,
                Err(e) => {
                    if let Err(close_err) = stream.close().await {
                        warn!(path = %stream.path, error = %close_err, "Close after failed append setup also failed");
                    }
                    return Err(e);
                }
            }
        }

        Ok(stream)
    }

    /// Remote path this stream was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the stream was opened with read access.
    pub fn can_read(&self) -> bool {
        self.handle.is_some() && self.access.can_read()
    }

    /// Whether the stream was opened with write access.
    pub fn can_write(&self) -> bool {
        self.handle.is_some() && self.access.can_write()
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// The remote handle, while the stream is open.
    pub fn handle(&self) -> Option<&FileHandle> {
        self.handle.as_ref()
    }

    /// Whether fetched bytes are waiting to be read.
    pub fn has_buffered_read_bytes(&self) -> bool {
        matches!(&self.mode, BufferMode::Reading(rb) if !rb.is_exhausted())
    }

    /// Whether written bytes are waiting to be sent.
    pub fn has_pending_write_bytes(&self) -> bool {
        matches!(&self.mode, BufferMode::Writing(wb) if !wb.data.is_empty())
    }

    /// Current position.
    ///
    /// Calls [`SftpSession::is_open`] before answering, so every call costs
    /// one liveness check on the session.
    pub fn position(&self) -> SkeinResult<u64> {
        self.open_handle()?;
        self.ensure_session_open()?;
        Ok(self.position)
    }

    /// Moves to an absolute position. Same as `seek(SeekFrom::Start(position))`.
    pub async fn set_position(&mut self, position: u64) -> SkeinResult<u64> {
        self.seek(SeekFrom::Start(position)).await
    }

    /// Reads into `buf`, returning the number of bytes delivered.
    ///
    /// Fewer bytes than requested means end of file was reached. An empty
    /// `buf` returns 0 without contacting the session.
    pub async fn read(&mut self, buf: &mut [u8]) -> SkeinResult<usize> {
        self.open_handle()?;
        if !self.access.can_read() {
            return Err(SkeinError::NotSupported("stream does not support reading".into()));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.ensure_session_open()?;
        self.enter_read_mode().await?;

        let mut delivered = 0;
        while delivered < buf.len() {
            if !self.has_buffered_read_bytes() && !self.fill_read_buffer().await? {
                break;
            }
            if let BufferMode::Reading(rb) = &mut self.mode {
                let n = rb.consume(&mut buf[delivered..]);
                trace!(path = %self.path, n, position = self.position, "Served read from buffer");
                delivered += n;
                self.position += n as u64;
            }
        }

        Ok(delivered)
    }

    /// Reads `count` bytes into `buf[offset..offset + count]`.
    pub async fn read_range(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        count: usize,
    ) -> SkeinResult<usize> {
        let range = checked_range(buf.len(), offset, count)?;
        self.read(&mut buf[range]).await
    }

    /// Reads one byte, or `None` at end of file.
    pub async fn read_byte(&mut self) -> SkeinResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte).await? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Writes all of `data` at the current position.
    ///
    /// Bytes are buffered; a remote write is issued only when the buffer
    /// would exceed the negotiated write length.
    pub async fn write(&mut self, data: &[u8]) -> SkeinResult<()> {
        self.open_handle()?;
        if !self.access.can_write() {
            return Err(SkeinError::NotSupported("stream does not support writing".into()));
        }
        if data.is_empty() {
            return Ok(());
        }
        if self.position.checked_add(data.len() as u64).is_none() {
            return Err(SkeinError::InvalidArgument(format!(
                "writing {} bytes at {} overflows the file offset",
                data.len(),
                self.position
            )));
        }
        self.ensure_session_open()?;
        self.enter_write_mode();

        let chunk = self.write_length()? as usize;
        let mut remaining = data;
        while !remaining.is_empty() {
            let pending = match &self.mode {
                BufferMode::Writing(wb) => wb.data.len(),
                _ => 0,
            };
            if pending >= chunk {
                self.flush_write_buffer().await?;
                continue;
            }

            let n = (chunk - pending).min(remaining.len());
            self.buffer_write(&remaining[..n], chunk);
            remaining = &remaining[n..];
        }

        Ok(())
    }

    /// Writes `count` bytes from `buf[offset..offset + count]`.
    pub async fn write_range(&mut self, buf: &[u8], offset: usize, count: usize) -> SkeinResult<()> {
        let range = checked_range(buf.len(), offset, count)?;
        self.write(&buf[range]).await
    }

    /// Writes one byte.
    pub async fn write_byte(&mut self, byte: u8) -> SkeinResult<()> {
        self.write(&[byte]).await
    }

    /// Sends any pending written bytes in one remote write.
    pub async fn flush(&mut self) -> SkeinResult<()> {
        self.open_handle()?;
        self.ensure_session_open()?;
        self.flush_write_buffer().await
    }

    /// Moves the position and returns the new absolute offset.
    ///
    /// A target inside the current read-ahead window only moves the buffer
    /// cursor. Any other target flushes pending writes and drops the read
    /// buffer. `SeekFrom::End` asks the server for the file size.
    pub async fn seek(&mut self, pos: SeekFrom) -> SkeinResult<u64> {
        self.open_handle()?;
        self.ensure_session_open()?;

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                self.flush_write_buffer().await?;
                self.remote_size().await?.checked_add_signed(delta)
            }
        };
        let target = target.ok_or_else(|| {
            SkeinError::InvalidArgument(format!("cannot seek to {:?} from {}", pos, self.position))
        })?;

        if let BufferMode::Reading(rb) = &mut self.mode {
            if rb.covers(target) {
                rb.move_to(target);
                self.position = target;
                trace!(path = %self.path, target, "Seek within read buffer");
                return Ok(target);
            }
        }

        self.flush_write_buffer().await?;
        self.mode = BufferMode::Idle;
        self.position = target;
        debug!(path = %self.path, target, "Seek");
        Ok(target)
    }

    /// Size of the remote file, after sending pending writes.
    pub async fn len(&mut self) -> SkeinResult<u64> {
        self.open_handle()?;
        self.ensure_session_open()?;
        self.flush_write_buffer().await?;
        self.remote_size().await
    }

    /// Flushes pending writes and closes the remote handle.
    ///
    /// The close request is sent even if the flush fails. If both fail, the
    /// close error is returned. Closing a closed stream does nothing.
    pub async fn close(&mut self) -> SkeinResult<()> {
        if self.handle.is_none() {
            return Ok(());
        }

        let flush_result = self.flush_write_buffer().await;
        if let Err(e) = &flush_result {
            warn!(path = %self.path, error = %e, "Flush before close failed; closing anyway");
        }
        self.mode = BufferMode::Idle;

        let Some(handle) = self.handle.take() else {
            return flush_result;
        };
        let close_result = self.session.close(&handle).await;

        match close_result {
            Ok(()) => {
                info!(path = %self.path, "Closed remote file");
                flush_result
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "Close failed");
                Err(e)
            }
        }
    }

    fn open_handle(&self) -> SkeinResult<&FileHandle> {
        self.handle.as_ref().ok_or(SkeinError::StreamClosed)
    }

    fn ensure_session_open(&self) -> SkeinResult<()> {
        if self.session.is_open() {
            Ok(())
        } else {
            Err(SkeinError::SessionClosed)
        }
    }

    fn read_length(&mut self) -> u32 {
        if let Some(length) = self.read_length {
            return length;
        }
        let length = self
            .session
            .optimal_read_length(self.config.buffer_size)
            .max(1);
        debug!(path = %self.path, requested = self.config.buffer_size, length, "Negotiated read length");
        self.read_length = Some(length);
        length
    }

    fn write_length(&mut self) -> SkeinResult<u32> {
        if let Some(length) = self.write_length {
            return Ok(length);
        }
        let length = self
            .session
            .optimal_write_length(self.config.buffer_size, self.open_handle()?)
            .max(1);
        debug!(path = %self.path, requested = self.config.buffer_size, length, "Negotiated write length");
        self.write_length = Some(length);
        Ok(length)
    }

    /// Leaves write mode, sending pending bytes first.
    async fn enter_read_mode(&mut self) -> SkeinResult<()> {
        if matches!(self.mode, BufferMode::Writing(_)) {
            self.flush_write_buffer().await?;
            self.mode = BufferMode::Idle;
        }
        Ok(())
    }

    /// Leaves read mode. Unread bytes are dropped; they were never delivered,
    /// so the position is already correct.
    fn enter_write_mode(&mut self) {
        if let BufferMode::Reading(rb) = &self.mode {
            trace!(path = %self.path, unread = rb.unread(), "Discarding read buffer");
            self.mode = BufferMode::Idle;
        }
    }

    /// Fetches the next window at the current position.
    ///
    /// Returns `false` at end of file. The whole response is kept even when
    /// the server returns more than was asked for.
    async fn fill_read_buffer(&mut self) -> SkeinResult<bool> {
        let length = self.read_length();
        let chunk = self
            .session
            .read(self.open_handle()?, self.position, length)
            .await?;

        debug!(
            path = %self.path,
            offset = self.position,
            requested = length,
            received = chunk.len(),
            "Filled read buffer"
        );

        if chunk.is_empty() {
            self.mode = BufferMode::Idle;
            return Ok(false);
        }
        if self.position.checked_add(chunk.len() as u64).is_none() {
            return Err(SkeinError::Protocol(format!(
                "server returned {} bytes at {}, past the largest file offset",
                chunk.len(),
                self.position
            )));
        }

        self.mode = BufferMode::Reading(ReadBuffer::new(self.position, chunk));
        Ok(true)
    }

    /// Sends the write buffer in one remote write and returns to idle.
    ///
    /// On failure the pending bytes are kept so a later flush or close can
    /// try again.
    async fn flush_write_buffer(&mut self) -> SkeinResult<()> {
        let has_pending = match &self.mode {
            BufferMode::Writing(wb) => !wb.data.is_empty(),
            _ => return Ok(()),
        };
        if !has_pending {
            self.mode = BufferMode::Idle;
            return Ok(());
        }

        let BufferMode::Writing(wb) = &self.mode else {
            return Ok(());
        };
        let handle = self.open_handle()?;
        self.session.write(handle, wb.start, &wb.data).await?;
        debug!(path = %self.path, offset = wb.start, len = wb.data.len(), "Flushed write buffer");

        self.mode = BufferMode::Idle;
        Ok(())
    }

    /// Appends to the write buffer, starting one at the current position if
    /// none is active. The caller keeps the buffer within `capacity`.
    fn buffer_write(&mut self, data: &[u8], capacity: usize) {
        match &mut self.mode {
            BufferMode::Writing(wb) => wb.data.extend_from_slice(data),
            mode => {
                let mut wb = WriteBuffer::new(self.position, capacity);
                wb.data.extend_from_slice(data);
                *mode = BufferMode::Writing(wb);
            }
        }
        self.position += data.len() as u64;
    }

    async fn remote_size(&self) -> SkeinResult<u64> {
        let attrs = self.session.fstat(self.open_handle()?).await?;
        attrs
            .size
            .ok_or_else(|| SkeinError::Protocol(format!("server did not report a size for {}", self.path)))
    }
}

impl<S: SftpSession + ?Sized + 'static> Drop for SftpFileStream<S> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let pending = match std::mem::take(&mut self.mode) {
            BufferMode::Writing(wb) if !wb.data.is_empty() => Some(wb),
            _ => None,
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(path = %self.path, ?handle, "Stream dropped outside a runtime; remote handle leaked");
                return;
            }
        };

        warn!(path = %self.path, "Stream dropped without close; closing in background");
        let session = Arc::clone(&self.session);
        let path = std::mem::take(&mut self.path);
        runtime.spawn(async move {
            if let Some(wb) = pending {
                if let Err(e) = session.write(&handle, wb.start, &wb.data).await {
                    warn!(path = %path, error = %e, "Background flush failed");
                }
            }
            if let Err(e) = session.close(&handle).await {
                warn!(path = %path, error = %e, "Background close failed");
            }
        });
    }
}

fn checked_range(len: usize, offset: usize, count: usize) -> SkeinResult<std::ops::Range<usize>> {
    match offset.checked_add(count) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(SkeinError::InvalidArgument(format!(
            "range {}+{} exceeds buffer of {} bytes",
            offset, count, len
        ))),
    }
}
