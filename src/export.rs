//! On-demand persistence of accumulated tables
//!
//! Four interchange formats, chosen to cover the downstream analysis
//! stacks a rig talks to: semicolon-separated text for widest
//! compatibility, Feather (Arrow IPC) for zero-copy columnar interchange,
//! ZSTD-compressed Parquet for archival, and row-oriented JSON for ad-hoc
//! tooling. The format is parsed before any file is created, so an
//! unrecognized format name never leaves a partial file behind.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arrow::ipc::writer::FileWriter as IpcFileWriter;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use crate::table::Table;
use crate::{Error, Result};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Semicolon-separated text, booleans encoded as 0/1.
    Csv,
    /// Arrow IPC file (columnar binary).
    Feather,
    /// ZSTD-compressed Parquet (compressed hierarchical table).
    Parquet,
    /// Row-oriented JSON: column name to ordered value sequence.
    Json,
}

impl LogFormat {
    /// File extension appended to the caller's path.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Feather => "feather",
            Self::Parquet => "parquet",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "feather" => Ok(Self::Feather),
            "parquet" => Ok(Self::Parquet),
            "json" => Ok(Self::Json),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Serialize a table to `<path>.<ext>` in the given format.
///
/// Returns the full output path.
///
/// # Errors
///
/// Returns an error if the file cannot be created or the underlying
/// writer fails.
pub fn write_table(table: &Table, path: &Path, format: LogFormat) -> Result<PathBuf> {
    // Append rather than replace the extension: run names like
    // "behavior.1" must stay intact.
    let mut out = path.as_os_str().to_owned();
    out.push(".");
    out.push(format.extension());
    let out = PathBuf::from(out);

    match format {
        LogFormat::Csv => write_csv(table, &out)?,
        LogFormat::Feather => write_feather(table, &out)?,
        LogFormat::Parquet => write_parquet(table, &out)?,
        LogFormat::Json => write_json(table, &out)?,
    }
    Ok(out)
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "{}", table.column_names().join(";"))?;
    for i in 0..table.num_rows() {
        write!(w, "{}", table.times()[i])?;
        for column in table.value_columns() {
            write!(w, ";{}", column[i])?;
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(())
}

fn write_feather(table: &Table, path: &Path) -> Result<()> {
    let batch = table.to_record_batch()?;
    let file = File::create(path)?;
    let mut writer = IpcFileWriter::try_new(file, &batch.schema())?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}

fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let batch = table.to_record_batch()?;
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_json(table: &Table, path: &Path) -> Result<()> {
    let mut doc = serde_json::Map::new();
    doc.insert(
        crate::table::TIME_COLUMN.to_string(),
        serde_json::to_value(table.times())?,
    );
    for (field, column) in table.schema().fields().iter().zip(table.value_columns()) {
        doc.insert(field.name().to_string(), serde_json::to_value(column)?);
    }
    let w = BufWriter::new(File::create(path)?);
    serde_json::to_writer(w, &doc)?;
    Ok(())
}
