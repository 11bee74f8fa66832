//! SFTP protocol support for the Skein remote file library.
//!
//! This crate provides:
//!
//! - **SFTP v3** message encoding and a request/response session over any
//!   byte-stream transport
//! - **`SftpFileStream`**, a buffered, seekable stream over a remote file
//!   that minimizes protocol round trips
//!
//! # Features
//!
//! - `sftp` (default) - SFTP session and file stream
//!
//! # Example
//!
//! ```rust
//! use skein_proto::sftp::{SftpMessage, SftpRequest};
//!
//! // Encode an SSH_FXP_CLOSE request and parse it back
//! let request = SftpRequest::Close { id: 1, handle: b"h1".to_vec() };
//! let wire_format = request.to_message().to_bytes();
//!
//! let parsed = SftpMessage::from_bytes(&wire_format).unwrap();
//! assert_eq!(SftpRequest::from_message(&parsed).unwrap(), request);
//! ```
//!
//! # References
//!
//! - [draft-ietf-secsh-filexfer-02](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02) - SSH File Transfer Protocol v3
//! - [RFC 4254](https://datatracker.ietf.org/doc/html/rfc4254) - SSH Connection Protocol (subsystems)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "sftp")]
pub mod sftp;
