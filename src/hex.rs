// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded hex dumps for `Debug` output and log messages.

use pretty_hex::PrettyHex;

/// Formats at most `max_bytes` of a payload as a `pretty-hex` dump.
///
/// Access units can be hundreds of kilobytes; printing them whole would bury
/// the interesting part of a log line.
pub(crate) struct LimitedHex<'a> {
    data: &'a [u8],
    max_bytes: usize,
}

impl<'a> LimitedHex<'a> {
    pub(crate) fn new(data: &'a [u8], max_bytes: usize) -> Self {
        Self { data, max_bytes }
    }
}

impl std::fmt::Debug for LimitedHex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = &self.data[..self.data.len().min(self.max_bytes)];
        writeln!(f, "Length: {0} (0x{0:x}) bytes", self.data.len())?;
        write!(
            f,
            "{:#?}",
            shown.hex_conf(pretty_hex::HexConfig {
                title: false,
                ..Default::default()
            })
        )?;
        let omitted = self.data.len() - shown.len();
        if omitted > 0 {
            write!(f, "\n...{0} (0x{0:x}) bytes not shown...", omitted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::LimitedHex;

    #[test]
    fn truncates() {
        let data = [0u8; 100];
        let s = format!("{:?}", LimitedHex::new(&data, 16));
        assert!(s.starts_with("Length: 100 (0x64) bytes\n"), "{s}");
        assert!(s.ends_with("...84 (0x54) bytes not shown..."), "{s}");

        let s = format!("{:?}", LimitedHex::new(&data[..4], 16));
        assert!(!s.contains("not shown"), "{s}");
    }
}
