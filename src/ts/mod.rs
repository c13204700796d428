//! MPEG-TS (ISO/IEC 13818-1) transport stream primitives: a bit-accurate
//! packet codec, a framed reader with prefix autodetection and re-sync, and a
//! framed writer. PSI (PAT/PMT) decode, PES reassembly, and CAS/scrambling
//! are out of scope; packet payloads are always opaque bytes.
//!
//! ```
//! use mpegts_toolkit::ts::packet;
//!
//! let mut bytes = vec![0x47, 0x1F, 0xFF];
//! bytes.extend(std::iter::repeat(0u8).take(185));
//! let packet = packet::parse(&bytes).unwrap();
//! assert!(packet.is_null());
//! ```

/// Bit-granular read/write cursor over a byte buffer.
pub mod bitstream;
/// Typed bit fields (`bslbf`, `uimsbf`, `tcimsbf`).
pub mod fields;
/// The 188-byte packet and adaptation field codec.
pub mod packet;
/// Framed reading with prefix autodetection/re-sync and discontinuity tracking.
pub mod reader;
/// Back-pressured framed writing.
pub mod writer;

pub use packet::{AdaptationField, Packet, ProgramClockReference, ScramblingControl};
pub use reader::{PacketReader, PacketReaderConfig, ReaderEvent};
pub use writer::FramedWriter;
