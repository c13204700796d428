#![doc(html_root_url = "https://docs.rs/mpegts-toolkit/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # mpegts-toolkit
//!
//! A toolkit for MPEG-TS (ISO/IEC 13818-1) transport streams: a bit-accurate
//! packet codec, a framed reader that autodetects and re-syncs to capture
//! prefixes, a PCR-paced HTTP fan-out server, and a stream splitter.
//!
//! Demuxing elementary streams, decoding PSI (PAT/PMT), CAS/scrambling, and
//! TS-over-UDP are out of scope; payloads and adaptation field extensions are
//! always treated as opaque bytes.
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mpegts-toolkit = "0.1.0"
//! ```
//!
//! ### Parsing a packet
//!
//! ```rust
//! use mpegts_toolkit::ts::packet;
//!
//! let mut bytes = vec![0x47, 0x1F, 0xFF];
//! bytes.extend(std::iter::repeat(0u8).take(185));
//! let packet = packet::parse(&bytes)?;
//! assert!(packet.is_null());
//! # Ok::<(), mpegts_toolkit::error::TsError>(())
//! ```
//!
//! ## Module Overview
//!
//! - `ts`: the bit-accurate packet codec (sync byte, header, adaptation
//!   field, PCR/OPCR), the framed reader with prefix autodetection/re-sync
//!   and discontinuity tracking, and the back-pressured framed writer.
//! - `server`: the PCR-paced streaming server and its HTTP fan-out client
//!   collaborator.
//! - `splitter`: splits a stream into output files by byte offset, packet
//!   count, or discontinuity segment, with dynamic segment templates.
//! - `config`: CLI/environment-driven settings shared by the three binaries.
//! - `error`: the crate-wide error type and `Result` alias.
//! - `humanreadable`: byte-count and hex dump formatting for `ts-dump`.

/// Configuration assembly for the three binaries.
pub mod config;

/// Error types and the crate-wide `Result` alias.
pub mod error;

/// Byte-count and hex dump formatting used by the dump binary.
pub mod humanreadable;

/// The stream server and its HTTP fan-out client collaborator.
pub mod server;

/// The stream splitter and its numeric-range output-template filter.
pub mod splitter;

/// MPEG-TS bit stream, typed fields, packet codec, reader, and writer.
pub mod ts;

pub use error::{Result, TsError};
