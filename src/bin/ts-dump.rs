//! Dump utility binary: decodes an MPEG-TS file's packets to a
//! human-readable line-per-packet listing.
//!
//! CLI shape grounded on `ts-dump/main.cpp`: one or more input files,
//! `--offset` to prefix each line with the packet's byte offset and index,
//! and `-v`/`-q` verbosity. The original's TS-packet-class-version switch
//! does not apply here since this toolkit has only one packet codec.

use clap::Parser;
use mpegts_toolkit::config::log_level_from_verbosity;
use mpegts_toolkit::humanreadable;
use mpegts_toolkit::ts::packet::{Packet, ScramblingControl};
use mpegts_toolkit::ts::reader::{PacketReader, ReaderEvent};

/// Dump MPEG-TS packet contents.
#[derive(Parser, Debug)]
#[command(name = "ts-dump", version, about)]
struct Args {
    /// File(s) to parse as an MPEG-TS stream.
    #[arg(required = true)]
    files: Vec<String>,

    /// Output the file offset of each TS packet.
    #[arg(long)]
    offset: bool,

    /// Increase verbosity (repeatable): also print adaptation field detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (repeatable). Cancels out -v.
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

fn format_packet(packet: &Packet, verbose: u8) -> String {
    if packet.is_null() {
        return "null".to_string();
    }

    let mut line = format!(
        "pid={} cc={} scrambling={}",
        packet.pid,
        packet.continuity_counter,
        match packet.scrambling_control {
            ScramblingControl::NotScrambled => "none",
            ScramblingControl::Reserved => "reserved",
            ScramblingControl::EvenKey => "even",
            ScramblingControl::OddKey => "odd",
        }
    );
    if packet.payload_unit_start_indicator {
        line.push_str(" pusi");
    }
    if packet.transport_error_indicator {
        line.push_str(" tei");
    }

    if let Some(af) = &packet.adaptation_field {
        if let Some(pcr) = af.pcr {
            line.push_str(&format!(" pcr={:.6}s", pcr.to_seconds()));
        }
        if verbose > 0 {
            if af.discontinuity {
                line.push_str(" discontinuity");
            }
            if af.random_access {
                line.push_str(" random_access");
            }
            if let Some(data) = &af.private_data {
                line.push_str(&format!(" private_data=[{}]", humanreadable::hexdump(data)));
            }
        }
    }

    if let Some(payload) = &packet.payload {
        line.push_str(&format!(" payload={}", humanreadable::byte_count(payload.len() as u64)));
    }

    line
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();
    let log_level = log_level_from_verbosity(args.verbose, args.quiet);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut exit_code = 0u8;
    let multiple = args.files.len() > 1;

    for file_name in &args.files {
        if multiple {
            println!("{file_name}:");
        }

        let file = match tokio::fs::File::open(file_name).await {
            Ok(f) => f,
            Err(e) => {
                eprintln!("ts-dump: error opening file \"{file_name}\": {e}");
                exit_code = exit_code.max(1);
                continue;
            }
        };

        let mut reader = PacketReader::new(file);
        loop {
            match reader.next_event().await {
                Ok(ReaderEvent::Eof) => {
                    if args.offset {
                        println!("(EOF)");
                    }
                    break;
                }
                Ok(ReaderEvent::Discontinuity { prev_pcr_seconds, segment }) => {
                    println!("^ discontinuity after pcr={prev_pcr_seconds:.6}s, segment={segment}");
                }
                Ok(ReaderEvent::PacketReady { packet, .. }) => {
                    if args.offset {
                        print!(
                            "offset={} count={} ",
                            reader.packet_offset(),
                            reader.packet_count()
                        );
                    }
                    println!("{}", format_packet(&packet, args.verbose));
                }
                Err(e) => {
                    eprintln!("ts-dump: error reading \"{file_name}\": {e}");
                    exit_code = exit_code.max(1);
                    break;
                }
            }
        }

        if multiple {
            println!();
        }
    }

    std::process::ExitCode::from(exit_code)
}
