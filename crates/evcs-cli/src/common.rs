//! Output helpers shared by the listing commands.

use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};

/// Output format for tabular/structured data.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON array
    Json,
    /// JSON Lines - one JSON object per line
    Jsonl,
    /// Comma-separated values
    Csv,
}

pub fn write_json<W: Write, T: Serialize>(
    data: &T,
    writer: &mut W,
    pretty: bool,
) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, data).map_err(io::Error::other)?;
    } else {
        serde_json::to_writer(&mut *writer, data).map_err(io::Error::other)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Write data as JSON Lines (one JSON object per line) to the given writer.
pub fn write_jsonl<W: Write, T: Serialize>(data: &[T], writer: &mut W) -> io::Result<()> {
    for item in data {
        serde_json::to_writer(&mut *writer, item).map_err(io::Error::other)?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Write flat records as CSV with a header row.
pub fn write_csv<W: Write, T: Serialize>(data: &[T], writer: W) -> io::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for item in data {
        csv_writer.serialize(item).map_err(io::Error::other)?;
    }
    csv_writer.flush()
}
