//! Splits a transport stream into output files governed by start/length
//! predicates and discontinuity-segment templates.
//!
//! Grounded on `Splitter`/`SplitterImpl` (`ts-split/splitter.h`): output
//! requests carry a `Start` (offset, packet index, or discontinuity segment)
//! and a `Length` in the same family of units (bytes, packets, or segments);
//! output templates instantiate fresh requests whenever a new discontinuity
//! segment's number matches a numeric-range filter.

pub mod numericrange;

use tokio::fs::OpenOptions;
use tokio::io::AsyncRead;

use crate::error::{Result, TsError};
use crate::ts::packet::{self, Packet};
use crate::ts::reader::{PacketReader, ReaderEvent};
use crate::ts::writer::FramedWriter;
use numericrange::NumericRangeSet;

/// Where an output request begins consuming the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// Begin once the packet's starting byte offset reaches this value.
    Offset(u64),
    /// Begin once the zero-based packet index reaches this value.
    Packet(u64),
    /// Begin once the discontinuity segment number reaches this value.
    DiscontinuitySegment(u32),
}

/// How much of the stream an output request consumes, and in what unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthKind {
    /// Stop once this many bytes (including any capture prefix) are written.
    Bytes(u64),
    /// Stop once this many packets are written.
    Packets(u64),
    /// Stop once this many discontinuity segments have elapsed.
    DiscontinuitySegments(u32),
}

/// A user-specified (static) output request.
#[derive(Debug, Clone)]
pub struct OutputRequest {
    /// Destination file path.
    pub file_path: String,
    /// Start predicate.
    pub start: StartKind,
    /// Length predicate, in the same unit family as `start` need not match.
    pub length: LengthKind,
}

impl OutputRequest {
    fn validate(&self) -> Result<()> {
        let non_negative = match self.start {
            StartKind::Offset(_) | StartKind::Packet(_) => true,
            StartKind::DiscontinuitySegment(n) => n >= 1,
        } && match self.length {
            LengthKind::Bytes(n) | LengthKind::Packets(n) => n > 0,
            LengthKind::DiscontinuitySegments(n) => n > 0,
        };
        if !non_negative {
            return Err(TsError::SplitterValidation(format!(
                "invalid start/length for output {}",
                self.file_path
            )));
        }
        Ok(())
    }
}

/// A template that instantiates a fresh [`OutputRequest`] whenever a new
/// discontinuity segment's number matches `filter`.
#[derive(Debug, Clone)]
pub struct OutputTemplate {
    /// Segment numbers this template applies to; an empty filter matches all.
    pub filter: NumericRangeSet,
    /// Format string with a single `{}` placeholder for the segment number.
    pub format: String,
}

impl OutputTemplate {
    fn validate(&self) -> Result<()> {
        if self.format.is_empty() {
            return Err(TsError::SplitterValidation(
                "output template format string is empty".to_string(),
            ));
        }
        if self.format.replace("{}", "1").is_empty() {
            return Err(TsError::SplitterValidation(
                "output template format string produces an empty filename".to_string(),
            ));
        }
        Ok(())
    }

    fn instantiate(&self, segment: u32) -> OutputRequest {
        OutputRequest {
            file_path: self.format.replace("{}", &segment.to_string()),
            start: StartKind::DiscontinuitySegment(segment),
            length: LengthKind::DiscontinuitySegments(1),
        }
    }
}

struct OutputState {
    request: OutputRequest,
    writer: Option<FramedWriter<tokio::fs::File>>,
    progress: u64,
}

impl OutputState {
    fn pending(request: OutputRequest) -> Self {
        Self {
            request,
            writer: None,
            progress: 0,
        }
    }

    fn is_started(&self, offset: u64, packet_index: u64, segment: u32) -> bool {
        match self.request.start {
            StartKind::Offset(n) => offset >= n,
            StartKind::Packet(n) => packet_index >= n,
            StartKind::DiscontinuitySegment(n) => segment >= n,
        }
    }

    fn is_finished(&self) -> bool {
        match self.request.length {
            LengthKind::Bytes(n) | LengthKind::Packets(n) => self.progress >= n,
            LengthKind::DiscontinuitySegments(n) => self.progress >= n as u64,
        }
    }

    async fn open(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.request.file_path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    TsError::OutputExists(self.request.file_path.clone())
                } else {
                    TsError::Io(e)
                }
            })?;
        self.writer = Some(FramedWriter::new(file));
        Ok(())
    }

    async fn write_packet(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            writer.queue_and_flush(bytes).await?;
        }
        match self.request.length {
            LengthKind::Bytes(_) => self.progress += bytes.len() as u64,
            LengthKind::Packets(_) => self.progress += 1,
            LengthKind::DiscontinuitySegments(_) => {}
        }
        Ok(())
    }
}

/// Drives a [`PacketReader`] and fans packets out to output files per the
/// configured requests and templates.
pub struct Splitter {
    outputs: Vec<OutputState>,
    templates: Vec<OutputTemplate>,
    strip_prefix: bool,
}

impl Splitter {
    /// Creates an empty splitter. Output requests/templates writing any bytes
    /// at all must be configured via [`Self::set_output_requests`] and/or
    /// [`Self::set_output_templates`] before [`Self::run`].
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            templates: Vec::new(),
            strip_prefix: false,
        }
    }

    /// When set, only the basic 188-byte packet is written to outputs,
    /// discarding any capture prefix. Defaults to `false` (prefix preserved).
    pub fn set_strip_prefix(&mut self, strip: bool) {
        self.strip_prefix = strip;
    }

    /// Replaces the static output requests, validating each one first.
    pub fn set_output_requests(&mut self, requests: Vec<OutputRequest>) -> Result<()> {
        for r in &requests {
            r.validate()?;
        }
        self.outputs = requests.into_iter().map(OutputState::pending).collect();
        Ok(())
    }

    /// Replaces the discontinuity-segment output templates, validating each one first.
    pub fn set_output_templates(&mut self, templates: Vec<OutputTemplate>) -> Result<()> {
        for t in &templates {
            t.validate()?;
        }
        self.templates = templates;
        Ok(())
    }

    fn expand_templates_for_segment(&mut self, segment: u32) {
        let new_requests: Vec<OutputRequest> = self
            .templates
            .iter()
            .filter(|t| t.filter.matches(segment as i64))
            .map(|t| t.instantiate(segment))
            .collect();
        for request in new_requests {
            self.outputs.push(OutputState::pending(request));
        }
    }

    async fn close_finished(&mut self) -> Result<()> {
        for out in self.outputs.iter_mut() {
            if out.writer.is_some() && out.is_finished() {
                out.writer = None;
            }
        }
        self.outputs.retain(|o| o.writer.is_some() || !o.is_finished());
        Ok(())
    }

    async fn on_discontinuity(&mut self, new_segment: u32) -> Result<()> {
        for out in self.outputs.iter_mut() {
            if out.writer.is_some() {
                if let LengthKind::DiscontinuitySegments(_) = out.request.length {
                    out.progress += 1;
                }
            }
        }
        self.close_finished().await?;
        self.expand_templates_for_segment(new_segment);
        Ok(())
    }

    async fn on_packet(
        &mut self,
        packet: &Packet,
        prefix: &[u8],
        packet_start_offset: u64,
        packet_index: u64,
        segment: u32,
    ) -> Result<()> {
        self.close_finished().await?;

        for out in self.outputs.iter_mut() {
            if out.writer.is_none() && out.is_started(packet_start_offset, packet_index, segment) {
                out.open().await?;
            }
        }

        let body = packet::generate(packet)?;
        let wire: Vec<u8> = if self.strip_prefix {
            body
        } else {
            let mut v = prefix.to_vec();
            v.extend_from_slice(&body);
            v
        };

        for out in self.outputs.iter_mut() {
            if out.writer.is_some() {
                out.write_packet(&wire).await?;
            }
        }
        Ok(())
    }

    /// Drives `reader` to completion, writing packets to configured outputs.
    pub async fn run<R: AsyncRead + Unpin>(&mut self, reader: &mut PacketReader<R>) -> Result<()> {
        self.expand_templates_for_segment(reader.segment());

        loop {
            let frame_size = reader.frame_size() as u64;
            match reader.next_event().await? {
                ReaderEvent::Eof => break,
                ReaderEvent::Discontinuity { segment, .. } => {
                    self.on_discontinuity(segment).await?;
                }
                ReaderEvent::PacketReady { packet, prefix } => {
                    let packet_index = reader.packet_count() - 1;
                    let packet_start_offset = reader.packet_offset() - frame_size;
                    self.on_packet(
                        &packet,
                        &prefix,
                        packet_start_offset,
                        packet_index,
                        reader.segment(),
                    )
                    .await?;
                }
            }
        }
        self.outputs.clear();
        Ok(())
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::packet::{AdaptationField, Packet as TsPacket, ProgramClockReference, ScramblingControl};
    use tempfile::tempdir;

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

    fn segment_stream(segments: u32, packets_per_segment: u32) -> Vec<u8> {
        let mut stream = Vec::new();
        let mut cc = 0u8;
        for seg in 0..segments {
            for i in 0..packets_per_segment {
                let seconds = seg as f64 * 10.0 + (i as f64 * 0.01);
                stream.extend(packet_with_pcr(seconds, cc));
                cc = cc.wrapping_add(1);
            }
        }
        stream
    }

    #[tokio::test]
    async fn splits_by_discontinuity_segment_template() {
        let dir = tempdir().unwrap();
        let stream = segment_stream(3, 100);
        let cursor = std::io::Cursor::new(stream);
        let mut reader = PacketReader::new(cursor);

        let mut splitter = Splitter::new();
        let out1 = dir.path().join("out-1.ts");
        let out2 = dir.path().join("out-2.ts");
        let out3 = dir.path().join("out-3.ts");
        let format = dir.path().join("out-{}.ts").to_string_lossy().to_string();
        splitter
            .set_output_templates(vec![OutputTemplate {
                filter: NumericRangeSet::from_str_spec("1-2").unwrap(),
                format,
            }])
            .unwrap();

        splitter.run(&mut reader).await.unwrap();

        let len1 = tokio::fs::metadata(&out1).await.unwrap().len();
        let len2 = tokio::fs::metadata(&out2).await.unwrap().len();
        assert_eq!(len1, 100 * packet::PACKET_SIZE as u64);
        assert_eq!(len2, 100 * packet::PACKET_SIZE as u64);
        assert!(tokio::fs::metadata(&out3).await.is_err());
    }

    #[tokio::test]
    async fn static_request_conserves_packet_count() {
        let dir = tempdir().unwrap();
        let stream = segment_stream(1, 50);
        let cursor = std::io::Cursor::new(stream);
        let mut reader = PacketReader::new(cursor);

        let mut splitter = Splitter::new();
        let out = dir.path().join("slice.ts");
        splitter
            .set_output_requests(vec![OutputRequest {
                file_path: out.to_string_lossy().to_string(),
                start: StartKind::Packet(0),
                length: LengthKind::Packets(10),
            }])
            .unwrap();

        splitter.run(&mut reader).await.unwrap();
        let len = tokio::fs::metadata(&out).await.unwrap().len();
        assert_eq!(len, 10 * packet::PACKET_SIZE as u64);
    }
}
