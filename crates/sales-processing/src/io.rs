//! CSV and JSON input/output.

use crate::error::{PreprocessingError, Result, ResultExt};
use crate::schema::SalesRecord;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Rows read to infer column types. Mixed columns such as `StateHoliday`
/// only show letters well into the file.
const INFER_SCHEMA_ROWS: usize = 10_000;

fn read_csv(path: &Path, quote_char: Option<u8>) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(quote_char))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
}

/// Load a CSV file with a header row.
///
/// Tries standard double-quote handling first, then reads without quoting.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    info!("Loading data from {}", path.display());

    if !path.exists() {
        error!("File not found: {}", path.display());
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )
        .into());
    }

    let df = match read_csv(path, Some(b'"')) {
        Ok(df) => df,
        Err(e) => {
            debug!("Standard loading failed: {}", e);
            read_csv(path, None).inspect_err(|e| {
                error!("Failed to load {}: {}", path.display(), e);
            })?
        }
    };

    info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Write a frame as CSV with a header row, creating parent directories.
pub fn write_csv(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    let mut df = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)?;

    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Read a JSON array of [`SalesRecord`]s.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<SalesRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .context(format!("Failed to read sales records from {}", path.display()))?;
    let records: Vec<SalesRecord> = serde_json::from_str(&content)
        .map_err(PreprocessingError::from)
        .context(format!("Invalid sales records in {}", path.display()))?;
    debug!("Read {} record(s) from {}", records.len(), path.display());
    Ok(records)
}
