//! End-to-end coverage of the splitter and dump paths against real files on
//! disk, as opposed to the in-memory `Cursor` fixtures the unit tests under
//! `src/` use.

use mpegts_toolkit::splitter::{LengthKind, OutputRequest, Splitter, StartKind};
use mpegts_toolkit::ts::packet::{
    self, AdaptationField, Packet, ProgramClockReference, ScramblingControl,
};
use mpegts_toolkit::ts::reader::{PacketReader, ReaderEvent};

fn packet_with_pcr(seconds: f64, cc: u8) -> Vec<u8> {
    let base = (seconds * 90_000.0) as u64;
    let af = AdaptationField {
        pcr: Some(ProgramClockReference { base, extension: 0 }),
        ..Default::default()
    };
    // Flags byte (1) + PCR (6) for a PCR-only adaptation field, no stuffing.
    let body_len = 7;
    let payload = vec![0u8; 184 - 1 - body_len];
    let packet = Packet {
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
async fn split_extracts_the_requested_packet_range_from_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.ts");

    let mut stream = Vec::new();
    for i in 0..40u8 {
        stream.extend(packet_with_pcr(i as f64 * 0.01, i % 16));
    }
    tokio::fs::write(&input_path, &stream).await.unwrap();

    let output_path = dir.path().join("slice.ts");
    let file = tokio::fs::File::open(&input_path).await.unwrap();
    let mut reader = PacketReader::new(file);

    let mut splitter = Splitter::new();
    splitter
        .set_output_requests(vec![OutputRequest {
            file_path: output_path.to_string_lossy().to_string(),
            start: StartKind::Packet(10),
            length: LengthKind::Packets(5),
        }])
        .unwrap();
    splitter.run(&mut reader).await.unwrap();

    let extracted = tokio::fs::read(&output_path).await.unwrap();
    let expected = &stream[10 * packet::PACKET_SIZE..15 * packet::PACKET_SIZE];
    assert_eq!(extracted, expected);
}

#[tokio::test]
async fn dump_reads_every_packet_of_a_real_file_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("input.ts");

    let mut stream = Vec::new();
    for i in 0..20u8 {
        stream.extend(packet_with_pcr(i as f64 * 0.1, i % 16));
    }
    tokio::fs::write(&input_path, &stream).await.unwrap();

    let file = tokio::fs::File::open(&input_path).await.unwrap();
    let mut reader = PacketReader::new(file);

    let mut seen_cc = Vec::new();
    loop {
        match reader.next_event().await.unwrap() {
            ReaderEvent::Eof => break,
            ReaderEvent::Discontinuity { .. } => {}
            ReaderEvent::PacketReady { packet, .. } => seen_cc.push(packet.continuity_counter),
        }
    }

    let expected: Vec<u8> = (0..20u8).map(|i| i % 16).collect();
    assert_eq!(seen_cc, expected);
    assert_eq!(reader.packet_count(), 20);
}
