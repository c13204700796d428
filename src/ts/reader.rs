//! Framed reading with prefix autodetection/re-sync, and PCR-based
//! discontinuity tracking on top of the packet codec.
//!
//! Grounded on the original `BytesReader`/`PacketReaderBase`/`PacketV2Reader`
//! trio: a frame-size-driven buffered reader feeding a packet-counting,
//! discontinuity-detecting layer. Both concerns live here because the
//! autodetection logic genuinely needs to see parsed packets (to confirm a
//! candidate frame size actually yields a valid sync byte run), not just raw
//! bytes.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, TsError};
use crate::ts::packet::{self, Packet, PACKET_SIZE, SYNC_BYTE};

/// Default number of consecutive parse failures that triggers a re-sync pass.
pub const DEFAULT_RESYNC_ERROR_THRESHOLD: u32 = 16;
/// Default maximum number of re-sync passes before giving up fatally.
pub const DEFAULT_RESYNC_PASS_CAP: usize = PACKET_SIZE + 20;

/// Tunables for [`PacketReader`]'s autodetection and re-sync behavior.
#[derive(Debug, Clone, Copy)]
pub struct PacketReaderConfig {
    /// Whether to autodetect the per-frame prefix length and re-sync on loss.
    pub autosize: bool,
    /// Forces a specific frame size (prefix + 188) instead of autodetecting.
    pub frame_size_override: Option<usize>,
    /// Consecutive parse failures before a re-sync pass is attempted.
    pub resync_error_threshold: u32,
    /// Maximum number of re-sync passes before failing fatally.
    pub resync_pass_cap: usize,
}

impl Default for PacketReaderConfig {
    fn default() -> Self {
        Self {
            autosize: true,
            frame_size_override: None,
            resync_error_threshold: DEFAULT_RESYNC_ERROR_THRESHOLD,
            resync_pass_cap: DEFAULT_RESYNC_PASS_CAP,
        }
    }
}

/// An event produced while pulling packets from a [`PacketReader`].
#[derive(Debug)]
pub enum ReaderEvent {
    /// A packet was decoded; carries the basic 188-byte packet and any
    /// capture prefix bytes that preceded it.
    PacketReady {
        /// The decoded packet.
        packet: Packet,
        /// Raw prefix bytes (timecode/FEC) that preceded the packet's sync byte.
        prefix: Vec<u8>,
    },
    /// A PCR discontinuity was detected on the most recent PCR-bearing packet.
    Discontinuity {
        /// The previous PCR, in seconds, before the jump.
        prev_pcr_seconds: f64,
        /// The new discontinuity segment number (post-increment).
        segment: u32,
    },
    /// The underlying source reached end of file cleanly.
    Eof,
}

/// Reads framed MPEG-TS packets from an async byte source, autodetecting and
/// re-syncing to the 0/4/16/20-byte capture prefix, and tracks packet count,
/// byte offset, discontinuity segment number, and the last-seen PCR.
pub struct PacketReader<R> {
    inner: R,
    pending: Vec<u8>,
    frame_size: usize,
    detected: bool,
    consecutive_errors: u32,
    packet_count: u64,
    packet_offset: u64,
    segment: u32,
    last_pcr_seconds: Option<f64>,
    cfg: PacketReaderConfig,
}

impl<R: AsyncRead + Unpin> PacketReader<R> {
    /// Wraps `inner` with the default configuration (autodetecting prefix size).
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, PacketReaderConfig::default())
    }

    /// Wraps `inner` with an explicit configuration.
    pub fn with_config(inner: R, cfg: PacketReaderConfig) -> Self {
        let frame_size = cfg.frame_size_override.unwrap_or(PACKET_SIZE);
        Self {
            inner,
            pending: Vec::new(),
            frame_size,
            detected: cfg.frame_size_override.is_some() || !cfg.autosize,
            consecutive_errors: 0,
            packet_count: 0,
            packet_offset: 0,
            segment: 1,
            last_pcr_seconds: None,
            cfg,
        }
    }

    /// Number of packets successfully decoded so far.
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Byte offset of the next packet to be read, within the logical stream.
    pub fn packet_offset(&self) -> u64 {
        self.packet_offset
    }

    /// Current discontinuity segment number (starts at 1).
    pub fn segment(&self) -> u32 {
        self.segment
    }

    /// Currently detected frame size (prefix length + 188).
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    async fn fill(&mut self, n: usize) -> Result<bool> {
        while self.pending.len() < n {
            let mut chunk = [0u8; 4096];
            let read = self.inner.read(&mut chunk).await?;
            if read == 0 {
                return Ok(false);
            }
            self.pending.extend_from_slice(&chunk[..read]);
        }
        Ok(true)
    }

    /// Bootstraps frame size by inspecting the first frame and peeking ahead
    /// for the next sync byte at offset 0, 4, 16, or 20.
    async fn detect(&mut self) -> Result<()> {
        if !self.fill(PACKET_SIZE).await? {
            self.detected = true;
            return Ok(());
        }
        if self.pending[0] == SYNC_BYTE {
            if self.fill(PACKET_SIZE * 2).await? {
                let next = &self.pending[PACKET_SIZE..PACKET_SIZE * 2];
                self.frame_size = if next[0] == SYNC_BYTE {
                    PACKET_SIZE
                } else if next.len() > 16 && next[16] == SYNC_BYTE {
                    PACKET_SIZE + 16
                } else if next.len() > 20 && next[20] == SYNC_BYTE {
                    PACKET_SIZE + 20
                } else {
                    PACKET_SIZE
                };
            } else {
                self.frame_size = PACKET_SIZE;
            }
        } else if self.pending.len() > 4 && self.pending[4] == SYNC_BYTE {
            self.frame_size = PACKET_SIZE + 4;
        } else {
            self.frame_size = PACKET_SIZE;
        }
        self.detected = true;
        Ok(())
    }

    /// Searches for a fresh sync byte after repeated parse failures, probing
    /// the same 0/4/16/20 prefix offsets as bootstrap detection.
    async fn resync(&mut self) -> Result<()> {
        for _ in 0..self.cfg.resync_pass_cap {
            if !self.fill(self.frame_size + 20).await? {
                return Err(TsError::Eof);
            }
            match self.pending[..self.frame_size].iter().position(|&b| b == SYNC_BYTE) {
                Some(0) => {
                    self.consecutive_errors = 0;
                    return Ok(());
                }
                Some(idx) => {
                    self.pending.drain(0..idx);
                }
                None => {
                    let drop_n = self.frame_size.min(self.pending.len());
                    self.pending.drain(0..drop_n);
                }
            }
        }
        Err(TsError::Parse(
            "re-sync failed after maximum passes".to_string(),
        ))
    }

    /// Pulls the next event: a decoded packet, a discontinuity notice, or EOF.
    pub async fn next_event(&mut self) -> Result<ReaderEvent> {
        if !self.detected {
            self.detect().await?;
        }

        loop {
            if !self.fill(self.frame_size).await? {
                return Ok(ReaderEvent::Eof);
            }
            let frame: Vec<u8> = self.pending.drain(0..self.frame_size).collect();
            let prefix_len = self.frame_size - PACKET_SIZE;
            let prefix = frame[..prefix_len].to_vec();
            let body = &frame[prefix_len..];

            match packet::parse(body) {
                Ok(p) => {
                    self.consecutive_errors = 0;
                    self.packet_count += 1;
                    self.packet_offset += self.frame_size as u64;

                    if let Some(event) = self.check_discontinuity(&p) {
                        // Callers must observe the discontinuity event before
                        // the packet that triggered it (§4.5); push the frame
                        // back to the front of `pending` so the next call
                        // re-reads and returns it as an ordinary PacketReady.
                        self.packet_count -= 1;
                        self.packet_offset -= self.frame_size as u64;
                        let mut requeued = frame;
                        requeued.append(&mut self.pending);
                        self.pending = requeued;
                        return Ok(event);
                    }

                    return Ok(ReaderEvent::PacketReady { packet: p, prefix });
                }
                Err(_) => {
                    self.consecutive_errors += 1;
                    if self.cfg.autosize && self.consecutive_errors >= self.cfg.resync_error_threshold
                    {
                        self.resync().await?;
                    }
                }
            }
        }
    }

    fn check_discontinuity(&mut self, p: &Packet) -> Option<ReaderEvent> {
        let pcr_seconds = p
            .adaptation_field
            .as_ref()
            .and_then(|af| af.pcr)
            .map(|pcr| pcr.to_seconds())?;

        let prev = self.last_pcr_seconds;
        let discontinuity = match prev {
            None => false,
            Some(last) => !(last <= pcr_seconds && pcr_seconds <= last + 1.0),
        };
        self.last_pcr_seconds = Some(pcr_seconds);

        if discontinuity {
            self.segment += 1;
            Some(ReaderEvent::Discontinuity {
                prev_pcr_seconds: prev.expect("discontinuity requires a prior PCR"),
                segment: self.segment,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::packet::{AdaptationField, Packet as TsPacket, ProgramClockReference, ScramblingControl};

    fn packet_with_pcr(seconds: f64, cc: u8) -> Vec<u8> {
        let base = (seconds * 90_000.0) as u64;
        let af = AdaptationField {
            pcr: Some(ProgramClockReference { base, extension: 0 }),
            ..Default::default()
        };
        let body_len = af.generate_body().unwrap().len();
        let payload = vec![0u8; 184 - 1 - body_len];
        let packet = TsPacket {
            transport_error_indicator: false,
            payload_unit_start_indicator: true,
            transport_priority: false,
            pid: 0x100,
            scrambling_control: ScramblingControl::NotScrambled,
            continuity_counter: cc,
            adaptation_field: Some(af),
            payload: Some(payload),
            null_tail: None,
        };
        packet::generate(&packet).unwrap()
    }

    #[tokio::test]
    async fn no_discontinuity_within_one_second_step() {
        let mut stream = Vec::new();
        stream.extend(packet_with_pcr(10.0, 0));
        stream.extend(packet_with_pcr(10.5, 1));
        let cursor = std::io::Cursor::new(stream);
        let mut reader = PacketReader::new(cursor);

        let mut discontinuities = 0;
        loop {
            match reader.next_event().await.unwrap() {
                ReaderEvent::Eof => break,
                ReaderEvent::Discontinuity { .. } => discontinuities += 1,
                ReaderEvent::PacketReady { .. } => {}
            }
        }
        assert_eq!(discontinuities, 0);
        assert_eq!(reader.segment(), 1);
    }

    #[tokio::test]
    async fn discontinuity_on_large_pcr_jump() {
        let mut stream = Vec::new();
        stream.extend(packet_with_pcr(10.0, 0));
        stream.extend(packet_with_pcr(15.0, 1));
        let cursor = std::io::Cursor::new(stream);
        let mut reader = PacketReader::new(cursor);

        let mut discontinuities = 0;
        loop {
            match reader.next_event().await.unwrap() {
                ReaderEvent::Eof => break,
                ReaderEvent::Discontinuity { prev_pcr_seconds, segment } => {
                    discontinuities += 1;
                    assert_eq!(prev_pcr_seconds, 10.0);
                    assert_eq!(segment, 2);
                }
                ReaderEvent::PacketReady { .. } => {}
            }
        }
        assert_eq!(discontinuities, 1);
        assert_eq!(reader.segment(), 2);
    }

    #[tokio::test]
    async fn basic_188_byte_stream_detects_frame_size_188() {
        let mut stream = Vec::new();
        for i in 0..4u8 {
            stream.extend(packet_with_pcr(1.0 + i as f64 * 0.1, i));
        }
        let cursor = std::io::Cursor::new(stream);
        let mut reader = PacketReader::new(cursor);
        let _ = reader.next_event().await.unwrap();
        assert_eq!(reader.frame_size(), PACKET_SIZE);
    }
}
