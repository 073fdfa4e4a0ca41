//! CSV Data Loader Module
//! Reads the three SNAP tables with Polars and normalizes their key column.

use crate::config::{PipelineConfig, TableSource};
use encoding_rs::Encoding;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Canonical join key shared by every loaded table.
pub const STATE_COLUMN: &str = "state";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid {encoding} text")]
    Decode {
        path: PathBuf,
        encoding: &'static str,
    },
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("{path} has no column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path} row {row} has an empty state")]
    MissingKey { path: PathBuf, row: usize },
    #[error("{path} lists state '{state}' more than once")]
    DuplicateKey { path: PathBuf, state: String },
    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// The three source tables, each keyed by `state`.
#[derive(Debug, Clone)]
pub struct SnapTables {
    pub benefits: DataFrame,
    pub households: DataFrame,
    pub persons: DataFrame,
}

/// Handles CSV file loading with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Load all three tables. The files are independent, so they are read in parallel.
    pub fn load_all(config: &PipelineConfig) -> Result<SnapTables, LoaderError> {
        let encoding = config.text_encoding()?;

        let (benefits, (households, persons)) = rayon::join(
            || Self::load_table(&config.benefits, encoding),
            || {
                rayon::join(
                    || Self::load_table(&config.households, encoding),
                    || Self::load_table(&config.persons, encoding),
                )
            },
        );

        Ok(SnapTables {
            benefits: benefits?,
            households: households?,
            persons: persons?,
        })
    }

    /// Load one delimited file and rename its key column to `state`.
    pub fn load_table(
        source: &TableSource,
        encoding: &'static Encoding,
    ) -> Result<DataFrame, LoaderError> {
        let bytes = fs::read(&source.path).map_err(|e| LoaderError::Io {
            path: source.path.clone(),
            source: e,
        })?;
        let text = Self::decode(&bytes, encoding).ok_or_else(|| LoaderError::Decode {
            path: source.path.clone(),
            encoding: encoding.name(),
        })?;

        let mut df = Self::parse_csv(text)?;
        debug!(
            path = %source.path.display(),
            columns = ?df.get_column_names(),
            "parsed csv"
        );

        for column in [&source.key_column, &source.value_column] {
            if df.column(column).is_err() {
                return Err(LoaderError::MissingColumn {
                    path: source.path.clone(),
                    column: column.clone(),
                });
            }
        }

        if source.key_column != STATE_COLUMN {
            df.rename(&source.key_column, STATE_COLUMN.into())?;
        }
        let key = df.column(STATE_COLUMN)?.cast(&DataType::String)?;
        df.with_column(key)?;

        Self::check_unique_keys(&df, source)?;

        info!(
            path = %source.path.display(),
            rows = df.height(),
            "loaded table"
        );
        Ok(df)
    }

    /// Decode raw bytes, rejecting malformed sequences instead of substituting.
    fn decode(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.trim_start_matches('\u{feff}').to_string())
    }

    fn parse_csv(text: String) -> Result<DataFrame, LoaderError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
            .finish()?;
        Ok(df)
    }

    /// `state` is the natural key: non-null and unique within each table.
    fn check_unique_keys(df: &DataFrame, source: &TableSource) -> Result<(), LoaderError> {
        let states = df.column(STATE_COLUMN)?.str()?;
        let mut seen = HashSet::with_capacity(states.len());

        for (row, state) in states.into_iter().enumerate() {
            let Some(state) = state else {
                return Err(LoaderError::MissingKey {
                    path: source.path.clone(),
                    row: row + 1,
                });
            };
            if !seen.insert(state) {
                return Err(LoaderError::DuplicateKey {
                    path: source.path.clone(),
                    state: state.to_string(),
                });
            }
        }
        Ok(())
    }
}
