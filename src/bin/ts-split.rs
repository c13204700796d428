//! Splitter binary: carves an MPEG-TS file into one or more output files by
//! byte offset, packet count, or discontinuity segment.
//!
//! CLI shape grounded on `ts-split/main.cpp` and `splitter.h`'s
//! `Output`/`OutputTemplate` structs: a static `--output` request names a
//! start point and a length, both in one of the three unit families; a
//! `--template` instantiates a fresh output every time a new discontinuity
//! segment's number matches a numeric-range filter.

use clap::Parser;
use mpegts_toolkit::config::{log_level_from_verbosity, Config};
use mpegts_toolkit::error::{Result, TsError};
use mpegts_toolkit::splitter::numericrange::NumericRangeSet;
use mpegts_toolkit::splitter::{LengthKind, OutputRequest, OutputTemplate, Splitter, StartKind};
use mpegts_toolkit::ts::reader::{PacketReader, PacketReaderConfig};

/// Split an MPEG-TS stream into files.
#[derive(Parser, Debug)]
#[command(name = "ts-split", version, about)]
struct Args {
    /// Path to the input MPEG-TS file.
    #[arg(short, long)]
    input: String,

    /// A static output request:
    /// `PATH:start=offset|packet|segment:N,length=bytes|packets|segments:N`.
    #[arg(short, long = "output")]
    outputs: Vec<String>,

    /// A discontinuity-segment output template:
    /// `FORMAT:filter=RANGESPEC` (FORMAT takes a `{}` segment placeholder;
    /// an empty or omitted filter matches every segment).
    #[arg(short, long = "template")]
    templates: Vec<String>,

    /// Write only the basic 188-byte packet to outputs, discarding any
    /// capture prefix.
    #[arg(long)]
    strip_prefix: bool,

    /// Disable capture-prefix autodetection and re-sync.
    #[arg(long)]
    no_autosize: bool,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (-q error, -qq off). Cancels out -v.
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

fn parse_start(spec: &str) -> Result<StartKind> {
    let (kind, value) = spec
        .split_once(':')
        .ok_or_else(|| TsError::SplitterValidation(format!("bad start spec: {spec}")))?;
    let n: i64 = value
        .parse()
        .map_err(|_| TsError::SplitterValidation(format!("bad start value: {value}")))?;
    match kind {
        "offset" => Ok(StartKind::Offset(n as u64)),
        "packet" => Ok(StartKind::Packet(n as u64)),
        "segment" => Ok(StartKind::DiscontinuitySegment(n as u32)),
        other => Err(TsError::SplitterValidation(format!(
            "unknown start kind: {other}"
        ))),
    }
}

fn parse_length(spec: &str) -> Result<LengthKind> {
    let (kind, value) = spec
        .split_once(':')
        .ok_or_else(|| TsError::SplitterValidation(format!("bad length spec: {spec}")))?;
    let n: i64 = value
        .parse()
        .map_err(|_| TsError::SplitterValidation(format!("bad length value: {value}")))?;
    match kind {
        "bytes" => Ok(LengthKind::Bytes(n as u64)),
        "packets" => Ok(LengthKind::Packets(n as u64)),
        "segments" => Ok(LengthKind::DiscontinuitySegments(n as u32)),
        other => Err(TsError::SplitterValidation(format!(
            "unknown length kind: {other}"
        ))),
    }
}

/// Parses `PATH:start=KIND:N,length=KIND:N`.
fn parse_output_request(spec: &str) -> Result<OutputRequest> {
    let (file_path, rest) = spec
        .split_once(':')
        .ok_or_else(|| TsError::SplitterValidation(format!("bad output spec: {spec}")))?;

    let mut start = None;
    let mut length = None;
    for field in rest.split(',') {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| TsError::SplitterValidation(format!("bad output field: {field}")))?;
        match key {
            "start" => start = Some(parse_start(value)?),
            "length" => length = Some(parse_length(value)?),
            other => {
                return Err(TsError::SplitterValidation(format!(
                    "unknown output field: {other}"
                )))
            }
        }
    }

    Ok(OutputRequest {
        file_path: file_path.to_string(),
        start: start.ok_or_else(|| TsError::SplitterValidation("missing start=".to_string()))?,
        length: length
            .ok_or_else(|| TsError::SplitterValidation("missing length=".to_string()))?,
    })
}

/// Parses `FORMAT:filter=RANGESPEC` (the `:filter=...` suffix is optional).
fn parse_output_template(spec: &str) -> Result<OutputTemplate> {
    match spec.split_once(":filter=") {
        Some((format, filter)) => Ok(OutputTemplate {
            filter: NumericRangeSet::from_str_spec(filter)?,
            format: format.to_string(),
        }),
        None => Ok(OutputTemplate {
            filter: NumericRangeSet::any(),
            format: spec.to_string(),
        }),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let mut config = Config::from_env_and_file();
    config.input_path = args.input;
    if args.no_autosize {
        config.autosize = false;
    }
    if args.verbose > 0 || args.quiet > 0 {
        config.log_level = log_level_from_verbosity(args.verbose, args.quiet);
    }
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.clone()),
    )
    .init();
    if let Err(e) = config.validate_input_path() {
        eprintln!("ts-split: {e}");
        return std::process::ExitCode::from(2);
    }

    let mut splitter = Splitter::new();
    splitter.set_strip_prefix(args.strip_prefix);

    let requests: Result<Vec<_>> = args.outputs.iter().map(|s| parse_output_request(s)).collect();
    let requests = match requests {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ts-split: {e}");
            return std::process::ExitCode::from(2);
        }
    };
    if let Err(e) = splitter.set_output_requests(requests) {
        eprintln!("ts-split: {e}");
        return std::process::ExitCode::from(2);
    }

    let templates: Result<Vec<_>> = args
        .templates
        .iter()
        .map(|s| parse_output_template(s))
        .collect();
    let templates = match templates {
        Ok(t) => t,
        Err(e) => {
            eprintln!("ts-split: {e}");
            return std::process::ExitCode::from(2);
        }
    };
    if let Err(e) = splitter.set_output_templates(templates) {
        eprintln!("ts-split: {e}");
        return std::process::ExitCode::from(2);
    }

    let file = match tokio::fs::File::open(&config.input_path).await {
        Ok(f) => f,
        Err(e) => {
            eprintln!(
                "ts-split: error opening file \"{}\": {e}",
                config.input_path
            );
            return std::process::ExitCode::from(1);
        }
    };

    let reader_cfg = PacketReaderConfig {
        autosize: config.autosize,
        frame_size_override: config.frame_size_override,
        resync_error_threshold: config.resync_error_threshold,
        resync_pass_cap: config.resync_pass_cap,
    };
    let mut reader = PacketReader::with_config(file, reader_cfg);

    if let Err(e) = splitter.run(&mut reader).await {
        eprintln!("ts-split: {e}");
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::SUCCESS
}
