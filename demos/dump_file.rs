//! Decodes every packet in an MPEG-TS file and prints a one-line summary per
//! packet, same shape as `ts-dump` but as a library-consumer example.
//!
//! Run with: `cargo run --example dump_file -- path/to/stream.ts`

use mpegts_toolkit::ts::reader::{PacketReader, ReaderEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    let path = std::env::args()
        .nth(1)
        .expect("usage: dump_file <path-to-mpegts-file>");

    let file = tokio::fs::File::open(&path).await?;
    let mut reader = PacketReader::new(file);

    loop {
        match reader.next_event().await {
            Ok(ReaderEvent::Eof) => break,
            Ok(ReaderEvent::Discontinuity { prev_pcr_seconds, segment }) => {
                println!("-- discontinuity after {prev_pcr_seconds:.3}s, now segment {segment}");
            }
            Ok(ReaderEvent::PacketReady { packet, .. }) => {
                let pcr = packet
                    .adaptation_field
                    .as_ref()
                    .and_then(|af| af.pcr)
                    .map(|p| format!("{:.3}s", p.to_seconds()));
                println!(
                    "#{:>6} pid={:<5} cc={:<2} pcr={}",
                    reader.packet_count(),
                    packet.pid,
                    packet.continuity_counter,
                    pcr.unwrap_or_else(|| "-".to_string())
                );
            }
            Err(e) => {
                eprintln!("error: {e}");
                break;
            }
        }
    }

    Ok(())
}
