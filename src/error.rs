//! # Error Types
//!
//! Central error type for this crate, `TsError`, covering the bit-stream
//! primitive layer, the packet codec, framing/I-O, the stream server, the
//! HTTP fan-out collaborator, the splitter, and configuration.
//!
//! ## Example
//!
//! ```rust
//! use mpegts_toolkit::error::{Result, TsError};
//!
//! fn require_sync_byte(b: u8) -> Result<()> {
//!     if b != 0x47 {
//!         return Err(TsError::BadSyncByte(b));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Primary error type for this crate.
#[derive(Error, Debug)]
pub enum TsError {
    /// I/O errors during file or socket operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A bit-stream read ran past the end of the buffer.
    #[error("bit stream read exceeded buffer bounds")]
    BitStreamBoundsExceeded,

    /// An aligned operation was attempted while not on a byte boundary.
    #[error("bit stream is not byte-aligned")]
    BitStreamNotAligned,

    /// A write supplied a value with bits set above the declared width.
    #[error("value does not fit in the declared bit width")]
    BitStreamValueOutOfRange,

    /// A signed write supplied a value that does not sign-extend to the declared width.
    #[error("value does not sign-extend to the declared bit width")]
    BitStreamImproperSignExtension,

    /// The packet did not begin with the MPEG-TS sync byte (0x47).
    #[error("bad sync byte: 0x{0:02x}")]
    BadSyncByte(u8),

    /// A two-bit enum field (scrambling control, adaptation field control) held its reserved value.
    #[error("reserved enum value encountered in {0}")]
    ReservedEnumValue(&'static str),

    /// The adaptation field or packet payload length did not match the bytes available.
    #[error("length mismatch: {0}")]
    LengthMismatch(String),

    /// Extra bits remained after a parse that should have consumed the whole buffer.
    #[error("trailing bits after parse")]
    TrailingBits,

    /// End of input reached while framing packets; not itself fatal.
    #[error("end of stream")]
    Eof,

    /// Malformed or unsupported HTTP request.
    #[error("http error: {0}")]
    Http(String),

    /// A splitter output request or template failed validation.
    #[error("splitter validation error: {0}")]
    SplitterValidation(String),

    /// Opening a splitter output file collided with an existing file.
    #[error("output file already exists: {0}")]
    OutputExists(String),

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A generic parse failure with a message, used where no more specific variant applies.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A specialized `Result` type for this crate's operations.
pub type Result<T> = std::result::Result<T, TsError>;
