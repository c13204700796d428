//! Parsing and generation of 188-byte MPEG-TS packets and their adaptation fields.
//!
//! This is the bit-accurate codec at the center of the toolkit: every other
//! component (the framed reader, the stream server, the splitter) consumes or
//! produces [`Packet`] values through [`parse`] and [`generate`]. PSI tables
//! (PAT/PMT), PES reassembly, and CAS/scrambling are out of scope; a packet's
//! payload is always treated as an opaque byte string.

use crate::error::{Result, TsError};
use crate::ts::bitstream::{BitStreamReader, BitStreamWriter};
use crate::ts::fields::{Tcimsbf, Uimsbf};

/// Size in bytes of a basic MPEG-TS packet, excluding any capture prefix.
pub const PACKET_SIZE: usize = 188;
/// The fixed sync byte that begins every packet.
pub const SYNC_BYTE: u8 = 0x47;
/// PID value reserved for null (stuffing) packets.
pub const NULL_PID: u16 = 0x1FFF;

/// Transport scrambling control, occupying 2 bits of the packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScramblingControl {
    /// Not scrambled.
    NotScrambled,
    /// Reserved value; present in the wire format but not otherwise defined.
    Reserved,
    /// Scrambled with an even key.
    EvenKey,
    /// Scrambled with an odd key.
    OddKey,
}

impl ScramblingControl {
    fn from_bits(v: u8) -> Self {
        match v {
            0 => Self::NotScrambled,
            1 => Self::Reserved,
            2 => Self::EvenKey,
            _ => Self::OddKey,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Self::NotScrambled => 0,
            Self::Reserved => 1,
            Self::EvenKey => 2,
            Self::OddKey => 3,
        }
    }
}

/// A 42-bit Program Clock Reference sample: a 33-bit base at 90 kHz plus a
/// 9-bit extension at 27 MHz, per ISO/IEC 13818-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramClockReference {
    /// 33-bit base, counted at 90 kHz.
    pub base: u64,
    /// 9-bit extension, counted at 27 MHz.
    pub extension: u16,
}

impl ProgramClockReference {
    /// The combined 27 MHz clock value: `base * 300 + extension`.
    pub fn value(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }

    /// The clock value expressed in seconds.
    pub fn to_seconds(&self) -> f64 {
        self.value() as f64 / 27_000_000.0
    }

    /// The clock value expressed in nanoseconds.
    pub fn to_nanoseconds(&self) -> f64 {
        self.value() as f64 * 1_000_000_000.0 / 27_000_000.0
    }

    fn read(r: &mut BitStreamReader<'_>) -> Result<Self> {
        let base = Uimsbf::<33>::read(r)?.0;
        let _reserved = Uimsbf::<6>::read(r)?;
        let extension = Uimsbf::<9>::read(r)?.0 as u16;
        Ok(Self { base, extension })
    }

    fn write(&self, w: &mut BitStreamWriter) -> Result<()> {
        Uimsbf::<33>(self.base).write(w)?;
        Uimsbf::<6>(0x3F).write(w)?;
        Uimsbf::<9>(self.extension as u64).write(w)?;
        Ok(())
    }
}

/// The adaptation field carried by a packet when its adaptation-field-control
/// bits select one.
///
/// The extension field (when present) is kept fully opaque: this toolkit does
/// not interpret its sub-fields (legal-time-window, piecewise-rate,
/// seamless-splice), only round-trips the raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationField {
    /// Discontinuity indicator.
    pub discontinuity: bool,
    /// Random access indicator.
    pub random_access: bool,
    /// Elementary stream priority indicator.
    pub es_priority: bool,
    /// Splicing point flag (whether `splice_countdown` is present).
    pub splicing_point: bool,
    /// Program Clock Reference, if the PCR flag was set.
    pub pcr: Option<ProgramClockReference>,
    /// Original Program Clock Reference, if the OPCR flag was set.
    pub opcr: Option<ProgramClockReference>,
    /// Splice countdown, present iff `splicing_point` is set.
    pub splice_countdown: Option<i8>,
    /// Transport private data, if the private-data flag was set.
    pub private_data: Option<Vec<u8>>,
    /// Opaque adaptation field extension bytes, if the extension flag was set.
    pub extension: Option<Vec<u8>>,
    /// Raw stuffing bytes filling out the declared adaptation field length.
    pub stuffing: Vec<u8>,
    /// True for a zero-length adaptation field: only the length byte itself
    /// is present on the wire, with no flags byte and no body.
    pub zero_length: bool,
}

impl AdaptationField {
    /// A zero-length adaptation field (`L == 0`): the length byte alone.
    pub fn empty() -> Self {
        Self {
            zero_length: true,
            ..Default::default()
        }
    }

    fn parse_body(body: &[u8]) -> Result<Self> {
        let mut r = BitStreamReader::new(body);
        let discontinuity = r.take_bit()?;
        let random_access = r.take_bit()?;
        let es_priority = r.take_bit()?;
        let pcr_flag = r.take_bit()?;
        let opcr_flag = r.take_bit()?;
        let splicing_point_flag = r.take_bit()?;
        let private_data_flag = r.take_bit()?;
        let extension_flag = r.take_bit()?;

        let pcr = if pcr_flag {
            Some(ProgramClockReference::read(&mut r)?)
        } else {
            None
        };
        let opcr = if opcr_flag {
            Some(ProgramClockReference::read(&mut r)?)
        } else {
            None
        };
        let splice_countdown = if splicing_point_flag {
            Some(Tcimsbf::<8>::read(&mut r)?.0 as i8)
        } else {
            None
        };
        let private_data = if private_data_flag {
            let len = Uimsbf::<8>::read(&mut r)?.0 as usize;
            Some(r.take_byte_array_aligned(len)?)
        } else {
            None
        };
        let extension = if extension_flag {
            let len = Uimsbf::<8>::read(&mut r)?.0 as usize;
            Some(r.take_byte_array_aligned(len)?)
        } else {
            None
        };
        let stuffing = r.take_rest_aligned()?;

        Ok(Self {
            discontinuity,
            random_access,
            es_priority,
            splicing_point: splicing_point_flag,
            pcr,
            opcr,
            splice_countdown,
            private_data,
            extension,
            stuffing,
            zero_length: false,
        })
    }

    fn generate_body(&self) -> Result<Vec<u8>> {
        if self.zero_length {
            return Ok(Vec::new());
        }
        let mut w = BitStreamWriter::new();
        w.put_bit(self.discontinuity);
        w.put_bit(self.random_access);
        w.put_bit(self.es_priority);
        w.put_bit(self.pcr.is_some());
        w.put_bit(self.opcr.is_some());
        w.put_bit(self.splicing_point);
        w.put_bit(self.private_data.is_some());
        w.put_bit(self.extension.is_some());

        if let Some(pcr) = &self.pcr {
            pcr.write(&mut w)?;
        }
        if let Some(opcr) = &self.opcr {
            opcr.write(&mut w)?;
        }
        if let Some(countdown) = self.splice_countdown {
            Tcimsbf::<8>(countdown as i64).write(&mut w)?;
        }
        if let Some(data) = &self.private_data {
            Uimsbf::<8>(data.len() as u64).write(&mut w)?;
            w.put_byte_array_aligned(data)?;
        }
        if let Some(data) = &self.extension {
            Uimsbf::<8>(data.len() as u64).write(&mut w)?;
            w.put_byte_array_aligned(data)?;
        }
        w.put_byte_array_aligned(&self.stuffing)?;
        Ok(w.finish())
    }
}

/// A parsed or to-be-generated MPEG-TS packet.
///
/// For a null packet (`pid == NULL_PID`), none of the header/adaptation/payload
/// fields below the PID are interpreted; `null_tail` carries the raw 185
/// trailing bytes verbatim so that `generate(parse(bytes)) == bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Transport error indicator.
    pub transport_error_indicator: bool,
    /// Payload unit start indicator.
    pub payload_unit_start_indicator: bool,
    /// Transport priority.
    pub transport_priority: bool,
    /// 13-bit packet identifier.
    pub pid: u16,
    /// Transport scrambling control.
    pub scrambling_control: ScramblingControl,
    /// 4-bit continuity counter.
    pub continuity_counter: u8,
    /// Adaptation field, if present.
    pub adaptation_field: Option<AdaptationField>,
    /// Payload bytes, if present.
    pub payload: Option<Vec<u8>>,
    /// Raw trailing 185 bytes for a null packet; `None` for non-null packets.
    pub null_tail: Option<Vec<u8>>,
}

impl Packet {
    /// True when this packet's PID is the reserved null-packet PID.
    pub fn is_null(&self) -> bool {
        self.pid == NULL_PID
    }

    /// True when this packet carries an adaptation field.
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field.is_some()
    }

    /// True when this packet carries a payload.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

/// Parses a single 188-byte basic packet (any capture prefix must already be
/// stripped by the caller).
pub fn parse(bytes: &[u8]) -> Result<Packet> {
    if bytes.len() != PACKET_SIZE {
        return Err(TsError::LengthMismatch(format!(
            "expected {} bytes, got {}",
            PACKET_SIZE,
            bytes.len()
        )));
    }

    let mut r = BitStreamReader::new(bytes);
    let sync_byte = r.take_byte_aligned()?;
    if sync_byte != SYNC_BYTE {
        return Err(TsError::BadSyncByte(sync_byte));
    }
    let transport_error_indicator = r.take_bit()?;
    let payload_unit_start_indicator = r.take_bit()?;
    let transport_priority = r.take_bit()?;
    let pid = Uimsbf::<13>::read(&mut r)?.0 as u16;

    if pid == NULL_PID {
        let tail = r.take_rest_aligned()?;
        return Ok(Packet {
            transport_error_indicator,
            payload_unit_start_indicator,
            transport_priority,
            pid,
            scrambling_control: ScramblingControl::NotScrambled,
            continuity_counter: 0,
            adaptation_field: None,
            payload: None,
            null_tail: Some(tail),
        });
    }

    let scrambling_control = ScramblingControl::from_bits(Uimsbf::<2>::read(&mut r)?.0 as u8);
    if scrambling_control == ScramblingControl::Reserved {
        return Err(TsError::ReservedEnumValue("scrambling_control"));
    }
    let afc = Uimsbf::<2>::read(&mut r)?.0 as u8;
    let continuity_counter = Uimsbf::<4>::read(&mut r)?.0 as u8;

    if afc == 0 {
        return Err(TsError::ReservedEnumValue("adaptation_field_control"));
    }

    let has_af = afc == 0b10 || afc == 0b11;
    let has_payload = afc == 0b01 || afc == 0b11;

    let adaptation_field = if has_af {
        let length = Uimsbf::<8>::read(&mut r)?.0 as usize;
        if length == 0 {
            Some(AdaptationField::empty())
        } else {
            let body = r.take_byte_array_aligned(length)?;
            Some(AdaptationField::parse_body(&body)?)
        }
    } else {
        None
    };

    let payload = if has_payload {
        let af_total = match &adaptation_field {
            None => 0,
            Some(af) => 1 + af.generate_body()?.len(),
        };
        let payload_len = 184usize
            .checked_sub(af_total)
            .ok_or_else(|| TsError::LengthMismatch("adaptation field longer than packet body".into()))?;
        Some(r.take_byte_array_aligned(payload_len)?)
    } else {
        None
    };

    if r.bits_left() != 0 {
        return Err(TsError::TrailingBits);
    }

    Ok(Packet {
        transport_error_indicator,
        payload_unit_start_indicator,
        transport_priority,
        pid,
        scrambling_control,
        continuity_counter,
        adaptation_field,
        payload,
        null_tail: None,
    })
}

/// Generates the 188-byte wire representation of `packet`.
pub fn generate(packet: &Packet) -> Result<Vec<u8>> {
    let mut w = BitStreamWriter::with_capacity(PACKET_SIZE);
    w.put_byte_aligned(SYNC_BYTE)?;
    w.put_bit(packet.transport_error_indicator);
    w.put_bit(packet.payload_unit_start_indicator);
    w.put_bit(packet.transport_priority);
    Uimsbf::<13>(packet.pid as u64).write(&mut w)?;

    if packet.pid == NULL_PID {
        let tail = packet
            .null_tail
            .clone()
            .unwrap_or_else(|| vec![0u8; PACKET_SIZE - 3]);
        if tail.len() != PACKET_SIZE - 3 {
            return Err(TsError::LengthMismatch(format!(
                "null packet tail must be {} bytes, got {}",
                PACKET_SIZE - 3,
                tail.len()
            )));
        }
        w.put_byte_array_aligned(&tail)?;
        return Ok(w.finish());
    }

    if packet.scrambling_control == ScramblingControl::Reserved {
        return Err(TsError::ReservedEnumValue("scrambling_control"));
    }
    Uimsbf::<2>(packet.scrambling_control.to_bits() as u64).write(&mut w)?;

    let afc: u8 = match (packet.adaptation_field.is_some(), packet.payload.is_some()) {
        (true, true) => 0b11,
        (true, false) => 0b10,
        (false, true) => 0b01,
        (false, false) => {
            return Err(TsError::ReservedEnumValue("adaptation_field_control"));
        }
    };
    Uimsbf::<2>(afc as u64).write(&mut w)?;
    Uimsbf::<4>(packet.continuity_counter as u64).write(&mut w)?;

    let mut af_total = 0usize;
    if let Some(af) = &packet.adaptation_field {
        let body = af.generate_body()?;
        Uimsbf::<8>(body.len() as u64).write(&mut w)?;
        w.put_byte_array_aligned(&body)?;
        af_total = 1 + body.len();
    }

    if let Some(payload) = &packet.payload {
        let expected_len = 184usize
            .checked_sub(af_total)
            .ok_or_else(|| TsError::LengthMismatch("adaptation field longer than packet body".into()))?;
        if payload.len() != expected_len {
            return Err(TsError::LengthMismatch(format!(
                "payload must be {} bytes given this adaptation field, got {}",
                expected_len,
                payload.len()
            )));
        }
        w.put_byte_array_aligned(payload)?;
    }

    let bytes = w.finish();
    if bytes.len() != PACKET_SIZE {
        return Err(TsError::LengthMismatch(format!(
            "generated packet is {} bytes, expected {}",
            bytes.len(),
            PACKET_SIZE
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn null_packet_round_trips() {
        let mut bytes = vec![0x47, 0x1F, 0xFF];
        bytes.extend(std::iter::repeat(0u8).take(185));
        let packet = parse(&bytes).unwrap();
        assert!(packet.is_null());
        assert!(!packet.transport_error_indicator);
        assert!(!packet.payload_unit_start_indicator);
        assert!(!packet.transport_priority);
        let regenerated = generate(&packet).unwrap();
        assert_eq!(regenerated, bytes);
    }

    #[test]
    fn pcr_only_adaptation_field_round_trips_and_reports_one_second() {
        let pcr = ProgramClockReference {
            base: 90_000,
            extension: 0,
        };
        assert_eq!(pcr.to_seconds(), 1.0);
        assert_eq!(pcr.to_nanoseconds(), 1_000_000_000.0);

        let af = AdaptationField {
            pcr: Some(pcr),
            ..Default::default()
        };
        let mut payload = vec![0xFFu8; 0];
        let body_len = af.generate_body().unwrap().len();
        payload.resize(184 - 1 - body_len, 0xAA);

        let packet = Packet {
            transport_error_indicator: false,
            payload_unit_start_indicator: true,
            transport_priority: false,
            pid: 0x100,
            scrambling_control: ScramblingControl::NotScrambled,
            continuity_counter: 3,
            adaptation_field: Some(af),
            payload: Some(payload),
            null_tail: None,
        };

        let wire = generate(&packet).unwrap();
        assert_eq!(wire.len(), PACKET_SIZE);
        let reparsed = parse(&wire).unwrap();
        assert_eq!(reparsed, packet);
        assert_eq!(
            reparsed.adaptation_field.unwrap().pcr.unwrap().to_seconds(),
            1.0
        );
    }

    #[test]
    fn rejects_reserved_adaptation_field_control() {
        let mut bytes = vec![0x47, 0x01, 0x00, 0x00];
        bytes.extend(std::iter::repeat(0u8).take(184));
        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_sync_byte() {
        let mut bytes = vec![0x46, 0x00, 0x00, 0x10];
        bytes.extend(std::iter::repeat(0u8).take(184));
        assert!(matches!(parse(&bytes), Err(TsError::BadSyncByte(0x46))));
    }

    #[test]
    fn rejects_reserved_scrambling_control_on_parse() {
        // pid 0x100, scrambling_control=01 (reserved), afc=01 (payload only)
        let mut bytes = vec![0x47, 0x01, 0x00, 0b0101_0000];
        bytes.extend(std::iter::repeat(0u8).take(184));
        assert!(matches!(
            parse(&bytes),
            Err(TsError::ReservedEnumValue("scrambling_control"))
        ));
    }

    #[test]
    fn rejects_reserved_scrambling_control_on_generate() {
        let packet = Packet {
            transport_error_indicator: false,
            payload_unit_start_indicator: false,
            transport_priority: false,
            pid: 0x100,
            scrambling_control: ScramblingControl::Reserved,
            continuity_counter: 0,
            adaptation_field: None,
            payload: Some(vec![0u8; 184]),
            null_tail: None,
        };
        assert!(matches!(
            generate(&packet),
            Err(TsError::ReservedEnumValue("scrambling_control"))
        ));
    }

    #[quickcheck_macros::quickcheck]
    fn payload_only_packet_round_trips(pid_seed: u16, cc_seed: u8, payload_seed: Vec<u8>) -> bool {
        let mut pid = pid_seed & 0x1FFF;
        if pid == NULL_PID {
            pid = 0;
        }
        let cc = cc_seed & 0x0F;
        let mut payload = payload_seed;
        payload.resize(184, 0xAA);

        let packet = Packet {
            transport_error_indicator: false,
            payload_unit_start_indicator: pid_seed % 2 == 0,
            transport_priority: false,
            pid,
            scrambling_control: ScramblingControl::NotScrambled,
            continuity_counter: cc,
            adaptation_field: None,
            payload: Some(payload),
            null_tail: None,
        };

        let wire = match generate(&packet) {
            Ok(w) => w,
            Err(_) => return false,
        };
        match parse(&wire) {
            Ok(reparsed) => reparsed == packet,
            Err(_) => false,
        }
    }
}
