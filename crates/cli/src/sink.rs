//! NDJSON (newline-delimited JSON) output for try results.
//!
//! One row per key: `{"key": "...", "result": {...}}`.

use serde::Serialize;
use std::io::{self, BufWriter, Write};
use wardkit_core::PropertyKey;
use wardkit_ward::{TryResult, TryResults};

#[derive(Debug, Serialize)]
pub struct TryRow<'a> {
    pub key: &'a PropertyKey,
    pub result: &'a TryResult,
}

/// Buffered NDJSON writer over any `Write`.
pub struct NdjsonSink<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl NdjsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
            rows_written: 0,
        }
    }

    pub fn write_row<T: Serialize>(&mut self, row: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, row).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Writes every key of a batch in key order.
    pub fn write_results(&mut self, results: &TryResults) -> io::Result<()> {
        for (key, result) in results.iter() {
            self.write_row(&TryRow { key, result })?;
        }
        Ok(())
    }

    /// Flush and return how many rows were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }
}
