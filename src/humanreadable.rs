//! Human-readable formatting helpers used by the `ts-dump` binary.
//!
//! Grounded on `HumanReadable::byteCount`/`HumanReadable::Hexdump`
//! (`libinfra/humanreadable.cpp`): a base-1024 byte count formatter, and a hex
//! dump that collapses an all-0x00 or all-0xff run into a single marker
//! instead of printing every byte.

/// Formats `count` bytes using binary (base-1024) unit prefixes, e.g.
/// `"1.00 KiB"`.
pub fn byte_count(count: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = count as f64;
    let mut unit = UNITS[0];
    for candidate in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = candidate;
    }
    if unit == UNITS[0] {
        format!("{count} B")
    } else {
        format!("{value:.2} {unit}")
    }
}

/// Renders `data` as a hex dump, collapsing a uniform run of `0x00` or `0xff`
/// bytes into a compact `"<n>x\"00\""`/`"<n>x\"ff\""` marker.
pub fn hexdump(data: &[u8]) -> String {
    if !data.is_empty() && data.iter().all(|&b| b == 0xff) {
        return format!("{}x\"ff\"", data.len());
    }
    if !data.is_empty() && data.iter().all(|&b| b == 0x00) {
        return format!("{}x\"00\"", data.len());
    }
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_count_formats_binary_units() {
        assert_eq!(byte_count(512), "512 B");
        assert_eq!(byte_count(1024), "1.00 KiB");
        assert_eq!(byte_count(1536), "1.50 KiB");
    }

    #[test]
    fn hexdump_collapses_uniform_runs() {
        assert_eq!(hexdump(&[0u8; 16]), "16x\"00\"");
        assert_eq!(hexdump(&[0xffu8; 8]), "8x\"ff\"");
        assert_eq!(hexdump(&[0x01, 0x02]), "01 02");
    }
}
