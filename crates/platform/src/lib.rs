//! # Skein Platform
//!
//! Core platform types shared by the Skein crates.
//!
//! This crate provides the unified error type (`SkeinError`, `SkeinResult`)
//! used across the SFTP session and file stream layers.
//!
//! # Examples
//!
//! ```
//! use skein_platform::{SkeinError, SkeinResult};
//!
//! fn checked_offset(offset: i64) -> SkeinResult<u64> {
//!     u64::try_from(offset)
//!         .map_err(|_| SkeinError::InvalidArgument("negative offset".to_string()))
//! }
//!
//! # fn main() -> SkeinResult<()> {
//! assert_eq!(checked_offset(7)?, 7);
//! assert!(checked_offset(-1).is_err());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{SkeinError, SkeinResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
