//! SFTP data types and structures.

use super::wire::WireReader;
use bytes::{BufMut, BytesMut};
use skein_platform::{SkeinError, SkeinResult};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// SFTP status codes (SSH_FX_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SftpErrorCode {
    /// SSH_FX_OK - Success
    Ok = 0,
    /// SSH_FX_EOF - End of file
    Eof = 1,
    /// SSH_FX_NO_SUCH_FILE - No such file
    NoSuchFile = 2,
    /// SSH_FX_PERMISSION_DENIED - Permission denied
    PermissionDenied = 3,
    /// SSH_FX_FAILURE - General failure
    Failure = 4,
    /// SSH_FX_BAD_MESSAGE - Bad message
    BadMessage = 5,
    /// SSH_FX_NO_CONNECTION - No connection
    NoConnection = 6,
    /// SSH_FX_CONNECTION_LOST - Connection lost
    ConnectionLost = 7,
    /// SSH_FX_OP_UNSUPPORTED - Operation not supported
    OpUnsupported = 8,
}

impl SftpErrorCode {
    /// Convert from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Eof),
            2 => Some(Self::NoSuchFile),
            3 => Some(Self::PermissionDenied),
            4 => Some(Self::Failure),
            5 => Some(Self::BadMessage),
            6 => Some(Self::NoConnection),
            7 => Some(Self::ConnectionLost),
            8 => Some(Self::OpUnsupported),
            _ => None,
        }
    }

    /// Returns the default message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Ok => "Success",
            Self::Eof => "End of file",
            Self::NoSuchFile => "No such file or directory",
            Self::PermissionDenied => "Permission denied",
            Self::Failure => "Failure",
            Self::BadMessage => "Bad message",
            Self::NoConnection => "No connection",
            Self::ConnectionLost => "Connection lost",
            Self::OpUnsupported => "Operation not supported",
        }
    }
}

/// A non-success SFTP status reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpError {
    /// Raw status code (may be outside the v3 range)
    pub code: u32,
    /// Error message from the server, or the code's default message
    pub message: String,
}

impl SftpError {
    /// Creates a new SFTP error.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            SftpErrorCode::from_u32(code)
                .map(|c| c.message().to_string())
                .unwrap_or_else(|| format!("Unknown status {}", code))
        } else {
            message
        };
        Self { code, message }
    }

    /// Returns the known status code, if any.
    pub fn known_code(&self) -> Option<SftpErrorCode> {
        SftpErrorCode::from_u32(self.code)
    }
}

impl fmt::Display for SftpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SFTP error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for SftpError {}

impl From<SftpError> for SkeinError {
    fn from(err: SftpError) -> Self {
        SkeinError::Remote {
            code: err.code,
            message: err.message,
        }
    }
}

/// File open flags (SSH_FXF_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileOpenFlags(pub u32);

impl FileOpenFlags {
    /// SSH_FXF_READ - Open for reading
    pub const READ: Self = Self(0x0000_0001);
    /// SSH_FXF_WRITE - Open for writing
    pub const WRITE: Self = Self(0x0000_0002);
    /// SSH_FXF_APPEND - Force writes to append
    pub const APPEND: Self = Self(0x0000_0004);
    /// SSH_FXF_CREAT - Create if doesn't exist
    pub const CREAT: Self = Self(0x0000_0008);
    /// SSH_FXF_TRUNC - Truncate to 0 length
    pub const TRUNC: Self = Self(0x0000_0010);
    /// SSH_FXF_EXCL - Fail if file exists
    pub const EXCL: Self = Self(0x0000_0020);

    /// Returns `true` if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FileOpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FileOpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// How the remote file is opened or created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file; fail if missing.
    Open,
    /// Open the file, creating it if missing.
    OpenOrCreate,
    /// Create the file, truncating it if it exists.
    Create,
    /// Create the file; fail if it exists.
    CreateNew,
    /// Open an existing file and truncate it.
    Truncate,
    /// Open or create the file and position the stream at its end.
    Append,
}

/// Which directions the stream may transfer data in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    /// Read only
    Read,
    /// Write only
    Write,
    /// Read and write
    ReadWrite,
}

impl FileAccess {
    /// Whether reads are permitted.
    pub fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether writes are permitted.
    pub fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Maps an open mode and access to SFTP open flags.
///
/// Rejects combinations that cannot be honoured: `Append` with read access,
/// and the truncating/creating modes with read-only access.
pub fn open_flags(mode: OpenMode, access: FileAccess) -> SkeinResult<FileOpenFlags> {
    match (mode, access) {
        (OpenMode::Append, FileAccess::Read | FileAccess::ReadWrite) => {
            return Err(SkeinError::InvalidArgument(format!(
                "{:?} mode requires write-only access",
                mode
            )));
        }
        (OpenMode::Create | OpenMode::CreateNew | OpenMode::Truncate, FileAccess::Read) => {
            return Err(SkeinError::InvalidArgument(format!(
                "{:?} mode requires write access",
                mode
            )));
        }
        _ => {}
    }

    let mut flags = match access {
        FileAccess::Read => FileOpenFlags::READ,
        FileAccess::Write => FileOpenFlags::WRITE,
        FileAccess::ReadWrite => FileOpenFlags::READ | FileOpenFlags::WRITE,
    };

    flags |= match mode {
        OpenMode::Open => FileOpenFlags::default(),
        OpenMode::OpenOrCreate => FileOpenFlags::CREAT,
        OpenMode::Create => FileOpenFlags::CREAT | FileOpenFlags::TRUNC,
        OpenMode::CreateNew => FileOpenFlags::CREAT | FileOpenFlags::EXCL,
        OpenMode::Truncate => FileOpenFlags::TRUNC,
        OpenMode::Append => FileOpenFlags::APPEND | FileOpenFlags::CREAT,
    };

    Ok(flags)
}

/// File mode (permissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode(pub u32);

/// File attribute flags (SSH_FILEXFER_ATTR_*).
#[derive(Debug, Clone, Copy)]
pub struct AttrFlags(pub u32);

impl AttrFlags {
    /// SSH_FILEXFER_ATTR_SIZE
    pub const SIZE: u32 = 0x00000001;
    /// SSH_FILEXFER_ATTR_UIDGID
    pub const UIDGID: u32 = 0x00000002;
    /// SSH_FILEXFER_ATTR_PERMISSIONS
    pub const PERMISSIONS: u32 = 0x00000004;
    /// SSH_FILEXFER_ATTR_ACMODTIME
    pub const ACMODTIME: u32 = 0x00000008;
    /// SSH_FILEXFER_ATTR_EXTENDED
    pub const EXTENDED: u32 = 0x80000000;
}

/// File attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttributes {
    /// File size in bytes
    pub size: Option<u64>,
    /// User ID
    pub uid: Option<u32>,
    /// Group ID
    pub gid: Option<u32>,
    /// Permissions
    pub permissions: Option<FileMode>,
    /// Access time (Unix timestamp)
    pub atime: Option<u32>,
    /// Modification time (Unix timestamp)
    pub mtime: Option<u32>,
}

impl FileAttributes {
    /// Creates empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes carrying only a size.
    pub fn with_size(size: u64) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    /// Appends the wire form to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut flags = 0u32;
        if self.size.is_some() {
            flags |= AttrFlags::SIZE;
        }
        if self.uid.is_some() && self.gid.is_some() {
            flags |= AttrFlags::UIDGID;
        }
        if self.permissions.is_some() {
            flags |= AttrFlags::PERMISSIONS;
        }
        if self.atime.is_some() && self.mtime.is_some() {
            flags |= AttrFlags::ACMODTIME;
        }

        buf.put_u32(flags);
        if let Some(size) = self.size {
            buf.put_u64(size);
        }
        if let (Some(uid), Some(gid)) = (self.uid, self.gid) {
            buf.put_u32(uid);
            buf.put_u32(gid);
        }
        if let Some(permissions) = self.permissions {
            buf.put_u32(permissions.0);
        }
        if let (Some(atime), Some(mtime)) = (self.atime, self.mtime) {
            buf.put_u32(atime);
            buf.put_u32(mtime);
        }
    }

    /// Serializes to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }

    pub(crate) fn decode(reader: &mut WireReader<'_>) -> SkeinResult<Self> {
        let flags = reader.read_u32("attribute flags")?;
        let mut attrs = Self::new();

        if flags & AttrFlags::SIZE != 0 {
            attrs.size = Some(reader.read_u64("size attribute")?);
        }
        if flags & AttrFlags::UIDGID != 0 {
            attrs.uid = Some(reader.read_u32("uid attribute")?);
            attrs.gid = Some(reader.read_u32("gid attribute")?);
        }
        if flags & AttrFlags::PERMISSIONS != 0 {
            attrs.permissions = Some(FileMode(reader.read_u32("permissions attribute")?));
        }
        if flags & AttrFlags::ACMODTIME != 0 {
            attrs.atime = Some(reader.read_u32("atime attribute")?);
            attrs.mtime = Some(reader.read_u32("mtime attribute")?);
        }
        if flags & AttrFlags::EXTENDED != 0 {
            let count = reader.read_u32("extended count")?;
            for _ in 0..count {
                reader.read_string("extended type")?;
                reader.read_string("extended data")?;
            }
        }

        Ok(attrs)
    }

    /// Parses from bytes, returning the attributes and bytes consumed.
    pub fn from_bytes(data: &[u8]) -> SkeinResult<(Self, usize)> {
        let mut reader = WireReader::new(data);
        let attrs = Self::decode(&mut reader)?;
        Ok((attrs, data.len() - reader.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(SftpErrorCode::from_u32(0), Some(SftpErrorCode::Ok));
        assert_eq!(SftpErrorCode::from_u32(2), Some(SftpErrorCode::NoSuchFile));
        assert_eq!(SftpErrorCode::from_u32(999), None);
    }

    #[test]
    fn test_sftp_error_default_message() {
        let err = SftpError::new(3, "");
        assert_eq!(err.message, "Permission denied");
        assert_eq!(err.known_code(), Some(SftpErrorCode::PermissionDenied));

        let skein: SkeinError = err.into();
        assert!(matches!(skein, SkeinError::Remote { code: 3, .. }));
    }

    #[test]
    fn test_open_flags_mapping() {
        assert_eq!(
            open_flags(OpenMode::Open, FileAccess::Read).unwrap(),
            FileOpenFlags::READ
        );
        assert_eq!(
            open_flags(OpenMode::Create, FileAccess::Write).unwrap(),
            FileOpenFlags::WRITE | FileOpenFlags::CREAT | FileOpenFlags::TRUNC
        );
        assert_eq!(
            open_flags(OpenMode::CreateNew, FileAccess::ReadWrite).unwrap(),
            FileOpenFlags(0x01 | 0x02 | 0x08 | 0x20)
        );

        let append = open_flags(OpenMode::Append, FileAccess::Write).unwrap();
        assert!(append.contains(FileOpenFlags::APPEND | FileOpenFlags::CREAT));
    }

    #[test]
    fn test_open_flags_rejects_invalid_combinations() {
        assert!(matches!(
            open_flags(OpenMode::Append, FileAccess::ReadWrite),
            Err(SkeinError::InvalidArgument(_))
        ));
        assert!(matches!(
            open_flags(OpenMode::Truncate, FileAccess::Read),
            Err(SkeinError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_file_attributes_serialization() {
        let mut attrs = FileAttributes::new();
        attrs.size = Some(1024);
        attrs.permissions = Some(FileMode(0o644));

        let bytes = attrs.to_bytes();
        let (parsed, consumed) = FileAttributes::from_bytes(&bytes).unwrap();

        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.size, Some(1024));
        assert_eq!(parsed.permissions.map(|p| p.0), Some(0o644));
    }

    #[test]
    fn test_file_attributes_skip_extended() {
        let mut buf = BytesMut::new();
        buf.put_u32(AttrFlags::SIZE | AttrFlags::EXTENDED);
        buf.put_u64(42);
        buf.put_u32(1);
        crate::sftp::wire::put_string(&mut buf, b"vendor@example.com");
        crate::sftp::wire::put_string(&mut buf, b"x");

        let (parsed, consumed) = FileAttributes::from_bytes(&buf).unwrap();
        assert_eq!(parsed.size, Some(42));
        assert_eq!(consumed, buf.len());
    }
}
