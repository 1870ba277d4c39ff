//! Data loading utilities

use crate::error::{ImmoError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Data loader for CSV, JSON and Parquet tables
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used to infer CSV column types
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
        }
    }

    /// Rows scanned for CSV type inference; `None` scans the whole file
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV (or TSV) file with a header row
    pub fn load_csv(&self, path: &Path, delimiter: u8) -> Result<DataFrame> {
        let file = File::open(path)?;

        let parse_opts = CsvParseOptions::default().with_separator(delimiter);

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file);

        Ok(reader.finish()?)
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        Ok(ParquetReader::new(file).finish()?)
    }

    /// Load a JSON file: an array of records, or one record per line for
    /// `.jsonl`/`.ndjson`
    pub fn load_json(&self, path: &Path, lines: bool) -> Result<DataFrame> {
        let file = File::open(path)?;
        let format = if lines { JsonFormat::JsonLines } else { JsonFormat::Json };
        Ok(JsonReader::new(file).with_json_format(format).finish()?)
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let start = Instant::now();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let df = match ext.as_str() {
            "csv" | "" => self.load_csv(path, b',')?,
            "tsv" => self.load_csv(path, b'\t')?,
            "parquet" | "pq" => self.load_parquet(path)?,
            "json" => self.load_json(path, false)?,
            "jsonl" | "ndjson" => self.load_json(path, true)?,
            other => {
                return Err(ImmoError::DataError(format!(
                    "unsupported file format '.{}' for {}",
                    other,
                    path.display()
                )))
            }
        };

        debug!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded table"
        );
        Ok(df)
    }
}

/// Load a table, picking the reader from the file extension
pub fn load_data(path: impl AsRef<Path>) -> Result<DataFrame> {
    DataLoader::new().load_auto(path)
}

/// Write a table as CSV with a header row
pub fn write_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}
