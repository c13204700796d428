//! Streaming server binary: reads an MPEG-TS file and paces it out to
//! connected HTTP clients at playback speed.
//!
//! Entry-point shape grounded on `streamserver-cvn-cli/main.cpp`.

use clap::Parser;
use mpegts_toolkit::config::{log_level_from_verbosity, Config};
use mpegts_toolkit::server::StreamServer;

/// Stream an MPEG-TS file to HTTP clients, paced by its PCR clock.
#[derive(Parser, Debug)]
#[command(name = "ts-server", version, about)]
struct Args {
    /// Path to the input MPEG-TS file.
    #[arg(short, long)]
    input: String,

    /// TCP port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable capture-prefix autodetection and re-sync.
    #[arg(long)]
    no_autosize: bool,

    /// Force a specific frame size (prefix length + 188) instead of autodetecting.
    #[arg(long)]
    frame_size: Option<usize>,

    /// Delay, in milliseconds, before reopening the input after EOF.
    #[arg(long)]
    reopen_delay_ms: Option<u64>,

    /// Per-client outbound queue high-water mark, in bytes.
    #[arg(long)]
    high_water_mark: Option<usize>,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (-q error, -qq off). Cancels out -v.
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let mut config = Config::from_env_and_file();
    config.input_path = args.input;
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if args.no_autosize {
        config.autosize = false;
    }
    if let Some(size) = args.frame_size {
        config.frame_size_override = Some(size);
    }
    if let Some(ms) = args.reopen_delay_ms {
        config.reopen_delay_ms = ms;
    }
    if let Some(hwm) = args.high_water_mark {
        config.client_high_water_mark = hwm;
    }
    if args.verbose > 0 || args.quiet > 0 {
        config.log_level = log_level_from_verbosity(args.verbose, args.quiet);
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.clone()),
    )
    .init();

    if let Err(e) = config.validate_input_path() {
        log::error!("{e}");
        return std::process::ExitCode::from(2);
    }

    let server = StreamServer::new(config);
    if let Err(e) = server.run().await {
        log::error!("server exited: {e}");
        return std::process::ExitCode::from(1);
    }
    std::process::ExitCode::SUCCESS
}
