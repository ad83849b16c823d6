//! ASCII pcache point-cache writer
//!
//! The pcache format is a six-line text header followed by one coordinate
//! triple per line:
//!
//! ```text
//! pcache
//! format ascii 1.0
//! elements <N>
//! property float position.x
//! property float position.y
//! property float position.z
//! end_header
//! <x> <y> <z>
//! ```
//!
//! `elements` is written up front from the job's projected point count; a
//! cancelled run therefore leaves a file whose declared count overstates
//! the data lines that follow. Consumers must tolerate that mismatch.

use lascache_core::Point3f;
use std::io::{self, Write};

/// File extension used for pcache output files.
pub const PCACHE_EXTENSION: &str = "pcache";

/// Formats one coordinate with up to 5 fractional digits, trimming
/// trailing zeros (`12.3`, `0`, `-4.00001`).
pub fn format_coord(value: f32) -> String {
    let rounded = (f64::from(value) * 1e5).round() / 1e5;
    if rounded == 0.0 {
        // also normalizes negative zero
        return "0".to_string();
    }
    let text = format!("{:.5}", rounded);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Streaming writer for one pcache output file.
///
/// Each instance owns its underlying writer exclusively for the lifetime
/// of the conversion task that created it. Points are appended line by
/// line, so output is never partially garbled: a line appears only for a
/// fully decoded point.
pub struct PcacheWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> PcacheWriter<W> {
    /// Wraps `inner` and writes the fixed pcache header declaring
    /// `elements` data lines.
    pub fn new(mut inner: W, elements: u64) -> io::Result<Self> {
        writeln!(inner, "pcache")?;
        writeln!(inner, "format ascii 1.0")?;
        writeln!(inner, "elements {}", elements)?;
        writeln!(inner, "property float position.x")?;
        writeln!(inner, "property float position.y")?;
        writeln!(inner, "property float position.z")?;
        writeln!(inner, "end_header")?;
        Ok(Self { inner, written: 0 })
    }

    /// Appends one data line.
    pub fn write_point(&mut self, point: &Point3f) -> io::Result<()> {
        writeln!(
            self.inner,
            "{} {} {}",
            format_coord(point.x),
            format_coord(point.y),
            format_coord(point.z)
        )?;
        self.written += 1;
        Ok(())
    }

    /// Number of data lines written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
