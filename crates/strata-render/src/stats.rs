#![forbid(unsafe_code)]

//! Render statistics and a byte-counting writer.
//!
//! ```
//! use strata_render::stats::CountingWriter;
//! use std::io::Write;
//!
//! let mut buffer = Vec::new();
//! let mut writer = CountingWriter::new(&mut buffer);
//! writer.write_all(b"\x1b[1;1H").unwrap();
//! assert_eq!(writer.bytes_written(), 6);
//! ```

use std::io::{self, Write};
use std::time::Duration;

/// A write wrapper that counts bytes written.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W> CountingWriter<W> {
    #[inline]
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Bytes written since creation or the last reset.
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    #[inline]
    pub fn reset_counter(&mut self) {
        self.bytes_written = 0;
    }

    #[inline]
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }
}

/// Counters accumulated across renders and rasterizations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub renders: u64,
    pub rasterizations: u64,
    /// Rasterizations that failed to write.
    pub failed_writes: u64,
    pub bytes_written: u64,
    /// Largest single frame, in bytes.
    pub max_frame_bytes: u64,
    pub cell_elisions: u64,
    pub cell_emissions: u64,
    pub fg_elisions: u64,
    pub fg_emissions: u64,
    pub bg_elisions: u64,
    pub bg_emissions: u64,
    pub default_elisions: u64,
    pub default_emissions: u64,
    pub sprixel_emissions: u64,
    pub sprixel_elisions: u64,
    pub sprixel_bytes: u64,
    /// Full repaints forced by a pile switch or refresh.
    pub refreshes: u64,
    pub render_time: Duration,
    pub raster_time: Duration,
}

impl RenderStats {
    /// Fraction of considered cells that needed no output.
    pub fn elision_ratio(&self) -> f64 {
        let total = self.cell_elisions + self.cell_emissions;
        if total == 0 {
            0.0
        } else {
            self.cell_elisions as f64 / total as f64
        }
    }

    /// Average bytes per rasterization.
    pub fn bytes_per_frame(&self) -> f64 {
        if self.rasterizations == 0 {
            0.0
        } else {
            self.bytes_written as f64 / self.rasterizations as f64
        }
    }

    pub(crate) fn record_frame(&mut self, bytes: u64) {
        self.rasterizations += 1;
        self.bytes_written += bytes;
        self.max_frame_bytes = self.max_frame_bytes.max(bytes);
    }

    /// Emit a summary at debug level.
    pub fn log(&self) {
        strata_core::debug!(
            renders = self.renders,
            rasterizations = self.rasterizations,
            bytes = self.bytes_written,
            elisions = self.cell_elisions,
            emissions = self.cell_emissions,
            sprixels = self.sprixel_emissions,
            "render stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_writer_counts_and_resets() {
        let mut buf = Vec::new();
        let mut w = CountingWriter::new(&mut buf);
        w.write_all(b"hello").unwrap();
        assert_eq!(w.bytes_written(), 5);
        w.reset_counter();
        w.write_all(b"hi").unwrap();
        assert_eq!(w.bytes_written(), 2);
        w.flush().unwrap();
        assert_eq!(w.into_inner().as_slice(), b"hellohi");
    }

    #[test]
    fn empty_write_counts_nothing() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"").unwrap();
        assert_eq!(w.bytes_written(), 0);
    }

    #[test]
    fn ratios_with_no_data() {
        let stats = RenderStats::default();
        assert_eq!(stats.elision_ratio(), 0.0);
        assert_eq!(stats.bytes_per_frame(), 0.0);
    }

    #[test]
    fn frame_recording() {
        let mut stats = RenderStats::default();
        stats.record_frame(100);
        stats.record_frame(40);
        assert_eq!(stats.rasterizations, 2);
        assert_eq!(stats.bytes_written, 140);
        assert_eq!(stats.max_frame_bytes, 100);
        assert_eq!(stats.bytes_per_frame(), 70.0);
    }

    #[test]
    fn elision_ratio() {
        let stats = RenderStats {
            cell_elisions: 3,
            cell_emissions: 1,
            ..RenderStats::default()
        };
        assert_eq!(stats.elision_ratio(), 0.75);
    }
}
