//! In-memory movie table loaded once from CSV.
//!
//! Every cell is kept as the text that appeared in the file; empty cells, cells
//! missing from short rows, and the usual missing-value markers (`NA`, `N/A`,
//! `NaN`, `null`, ...) become `""`. The table also precomputes the context blob handed to the
//! generative fallback.

use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, instrument};

pub const TITLE_COLUMN: &str = "Title";
pub const GENRE_COLUMN: &str = "Genre";
pub const RATING_COLUMN: &str = "Rating";

/// Cell values read as missing, matched exactly like pandas' default `na_values`.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn normalize_cell(cell: &str) -> String {
    if MISSING_MARKERS.contains(&cell) {
        String::new()
    } else {
        cell.to_string()
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset is missing required column `{0}`")]
    MissingColumn(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRecord {
    pub title: String,
    pub genre: String,
    pub rating: String,
    /// All cells of the row in column order, including the three above.
    pub fields: Vec<String>,
}

impl MovieRecord {
    pub fn format_line(&self) -> String {
        format!("- {} (Rating: {})", self.title, self.rating)
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    records: Vec<MovieRecord>,
    context_blob: String,
}

impl Dataset {
    #[instrument]
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path).map_err(|source| DatasetError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let dataset = Self::from_reader(file)?;
        info!(records = dataset.len(), "Loaded movie dataset");
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(DatasetError::MissingColumn(name))
        };
        let title_idx = column(TITLE_COLUMN)?;
        let genre_idx = column(GENRE_COLUMN)?;
        let rating_idx = column(RATING_COLUMN)?;

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let mut fields: Vec<String> = row.iter().map(normalize_cell).collect();
            // Short rows are padded; extra trailing cells are kept as-is.
            if fields.len() < headers.len() {
                fields.resize(headers.len(), String::new());
            }
            records.push(MovieRecord {
                title: fields[title_idx].clone(),
                genre: fields[genre_idx].clone(),
                rating: fields[rating_idx].clone(),
                fields,
            });
        }

        let context_blob = build_context_blob(&records);
        debug!(bytes = context_blob.len(), "Built context blob");

        Ok(Self {
            headers,
            records,
            context_blob,
        })
    }

    /// Case-insensitive literal substring match on the genre column, in load order.
    ///
    /// An empty query is a substring of every genre and therefore returns all records.
    pub fn lookup(&self, query: &str) -> Vec<&MovieRecord> {
        let needle = query.to_lowercase();
        self.records
            .iter()
            .filter(|record| record.genre.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn context_blob(&self) -> &str {
        &self.context_blob
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[MovieRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn build_context_blob(records: &[MovieRecord]) -> String {
    records
        .iter()
        .map(|record| record.fields.join(". "))
        .collect::<Vec<_>>()
        .join("\n")
}
