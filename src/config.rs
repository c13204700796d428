//! Configuration assembly.
//!
//! `Config` is an explicitly constructed, immutable value built once in each
//! binary's `main`, unlike the original `lazy_static`-backed global; there is
//! no process-wide mutable singleton here. Precedence mirrors the original
//! idea (environment variable overrides the built-in default, an on-disk
//! config file overrides the environment) but CLI flags, layered on top by
//! each binary via `clap`, always win.

use std::env;
use std::fs;
use std::path::Path;

use crate::error::{Result, TsError};
use crate::ts::reader::{DEFAULT_RESYNC_ERROR_THRESHOLD, DEFAULT_RESYNC_PASS_CAP};

/// Default TCP port the stream server listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;
/// Default delay, in milliseconds, before reopening an input file after EOF.
pub const DEFAULT_REOPEN_DELAY_MS: u64 = 1000;
/// Default per-client outbound queue high-water mark, in bytes, past which a
/// client is dropped rather than allowed to grow unbounded (§9 Open Question 1).
pub const DEFAULT_CLIENT_HIGH_WATER_MARK: usize = 4 * 1024 * 1024;
/// Default cap, in bytes, on a single buffered HTTP request.
pub const DEFAULT_HTTP_REQUEST_CAP: usize = 10 * 1024;

/// Assembled settings shared by the three binaries. Not every field is
/// meaningful to every binary; each `bin/*.rs` reads only what it needs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the input MPEG-TS file.
    pub input_path: String,
    /// TCP listen port for the stream server.
    pub listen_port: u16,
    /// Whether to autodetect the capture prefix size and re-sync on loss.
    pub autosize: bool,
    /// Forces a specific frame size (prefix + 188) instead of autodetecting.
    pub frame_size_override: Option<usize>,
    /// Consecutive parse failures before a re-sync pass is attempted.
    pub resync_error_threshold: u32,
    /// Maximum number of re-sync passes before failing fatally.
    pub resync_pass_cap: usize,
    /// Delay before reopening the input file after EOF.
    pub reopen_delay_ms: u64,
    /// Per-client outbound queue high-water mark, in bytes.
    pub client_high_water_mark: usize,
    /// Cap on a single buffered HTTP request, in bytes.
    pub http_request_cap: usize,
    /// Logging verbosity, as a `log`-compatible level name (e.g. "info").
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            listen_port: DEFAULT_LISTEN_PORT,
            autosize: true,
            frame_size_override: None,
            resync_error_threshold: DEFAULT_RESYNC_ERROR_THRESHOLD,
            resync_pass_cap: DEFAULT_RESYNC_PASS_CAP,
            reopen_delay_ms: DEFAULT_REOPEN_DELAY_MS,
            client_high_water_mark: DEFAULT_CLIENT_HIGH_WATER_MARK,
            http_request_cap: DEFAULT_HTTP_REQUEST_CAP,
            log_level: "info".to_string(),
        }
    }
}

/// Maps a net verbosity (`-v` count minus `-q` count) onto a `log`-compatible
/// level name, with `"info"` as the zero point.
pub fn log_level_from_verbosity(verbose: u8, quiet: u8) -> String {
    let net = verbose as i8 - quiet as i8;
    match net {
        i8::MIN..=-2 => "off",
        -1 => "error",
        0 => "info",
        1 => "debug",
        2..=i8::MAX => "trace",
    }
    .to_string()
}

impl Config {
    /// Builds a config from built-in defaults, then environment variables
    /// (`MPEGTS_*`), then an on-disk `mpegts.toml`/`./mpegts_config.toml` if
    /// present. CLI flags are layered on top by the caller afterward.
    pub fn from_env_and_file() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("MPEGTS_LISTEN_PORT") {
            if let Ok(port) = v.parse() {
                config.listen_port = port;
            }
        }
        if let Ok(v) = env::var("MPEGTS_LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = env::var("MPEGTS_INPUT") {
            config.input_path = v;
        }

        for path in ["./mpegts.toml", "./mpegts_config.toml"] {
            if let Ok(content) = fs::read_to_string(path) {
                config.apply_key_value_lines(&content);
            }
        }

        config
    }

    fn apply_key_value_lines(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key {
                "input_path" => self.input_path = value.to_string(),
                "listen_port" => {
                    if let Ok(v) = value.parse() {
                        self.listen_port = v;
                    }
                }
                "log_level" => self.log_level = value.to_string(),
                "reopen_delay_ms" => {
                    if let Ok(v) = value.parse() {
                        self.reopen_delay_ms = v;
                    }
                }
                "client_high_water_mark" => {
                    if let Ok(v) = value.parse() {
                        self.client_high_water_mark = v;
                    }
                }
                _ => {}
            }
        }
    }

    /// Validates that fields required for the current run are sensible.
    /// Called before any I/O is opened so a bad config fails fast.
    pub fn validate_input_path(&self) -> Result<()> {
        if self.input_path.is_empty() {
            return Err(TsError::Config("no input path given".to_string()));
        }
        if !Path::new(&self.input_path).exists() {
            return Err(TsError::Config(format!(
                "input path does not exist: {}",
                self.input_path
            )));
        }
        Ok(())
    }

    /// Writes a commented template config file if `path` does not already exist.
    pub fn write_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
        if path.as_ref().exists() {
            return Ok(());
        }
        let template = r#"# mpegts-toolkit configuration template
# Copy to mpegts.toml and adjust as needed.

input_path = "stream.ts"
listen_port = 8080
log_level = "info"
reopen_delay_ms = 1000
client_high_water_mark = 4194304
"#;
        fs::write(path, template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.listen_port, DEFAULT_LISTEN_PORT);
        assert!(config.autosize);
    }

    #[test]
    fn key_value_lines_override_defaults() {
        let mut config = Config::default();
        config.apply_key_value_lines("listen_port = 9000\nlog_level = \"debug\"\n");
        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn verbosity_maps_around_info() {
        assert_eq!(log_level_from_verbosity(0, 0), "info");
        assert_eq!(log_level_from_verbosity(1, 0), "debug");
        assert_eq!(log_level_from_verbosity(2, 0), "trace");
        assert_eq!(log_level_from_verbosity(3, 0), "trace");
        assert_eq!(log_level_from_verbosity(0, 1), "error");
        assert_eq!(log_level_from_verbosity(0, 2), "off");
        assert_eq!(log_level_from_verbosity(1, 1), "info");
    }
}
