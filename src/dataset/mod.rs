// src/dataset/mod.rs
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::error::{AggregateError, DatasetError};

pub mod load;
pub mod utils;

pub use load::{load_csv, load_json, load_path, DataFormat, JsonLayout};

/// Ordered, unique column keys shared by every row of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from header names. Names are trimmed; duplicates are rejected.
    pub fn new<I, S>(columns: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cols = Vec::new();
        let mut index = HashMap::new();
        for (pos, raw) in columns.into_iter().enumerate() {
            let name = raw.into().trim().to_string();
            if index.insert(name.clone(), pos).is_some() {
                return Err(DatasetError::DuplicateColumn(name));
            }
            cols.push(name);
        }
        Ok(Self {
            columns: cols,
            index,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Position of `key`, or `InvalidColumn` when the schema lacks it.
    pub fn require(&self, key: &str) -> crate::error::Result<usize> {
        self.position(key).ok_or_else(|| AggregateError::InvalidColumn {
            column: key.to_string(),
        })
    }

    /// Positions of every key in `keys`, failing on the first missing one.
    pub fn require_all<S: AsRef<str>>(&self, keys: &[S]) -> crate::error::Result<Vec<usize>> {
        keys.iter().map(|k| self.require(k.as_ref())).collect()
    }
}

/// A read-only view of one record: column key → raw cell.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    schema: &'a Schema,
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.schema.position(key).map(|i| self.cells[i].as_str())
    }

    /// Raw cell at a position obtained from [`Schema::require`].
    pub fn at(&self, pos: usize) -> &'a str {
        self.cells[pos].as_str()
    }

    /// Numeric value of `key`; `None` when the column is absent or the cell is missing.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(utils::parse_number)
    }

    pub fn number_at(&self, pos: usize) -> Option<f64> {
        utils::parse_number(self.at(pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let schema = self.schema;
        let cells = self.cells;
        schema
            .columns
            .iter()
            .zip(cells.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// An immutable, ordered sequence of rows over one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Arc<Schema>,
    records: Vec<Vec<String>>,
}

impl Dataset {
    /// Build from a header and positional records. Every record must have one cell per column.
    pub fn new<S: Into<String>>(
        columns: Vec<S>,
        records: Vec<Vec<String>>,
    ) -> Result<Self, DatasetError> {
        let schema = Schema::new(columns)?;
        for (row, rec) in records.iter().enumerate() {
            if rec.len() != schema.len() {
                return Err(DatasetError::RaggedRecord {
                    row,
                    expected: schema.len(),
                    found: rec.len(),
                });
            }
        }
        Ok(Self {
            schema: Arc::new(schema),
            records,
        })
    }

    /// Build from keyed rows. The first row fixes the column order; every later
    /// row must carry exactly the same key set.
    pub fn from_rows<I, R, K, V>(rows: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut rows = rows.into_iter();
        let Some(first) = rows.next() else {
            return Self::new(Vec::<String>::new(), Vec::new());
        };

        let (header, first_cells): (Vec<String>, Vec<String>) = first
            .into_iter()
            .map(|(k, v)| (k.into().trim().to_string(), v.into()))
            .unzip();
        let schema = Schema::new(header)?;
        let mut records = vec![first_cells];

        for (offset, row) in rows.enumerate() {
            let row_idx = offset + 1;
            let mut cells: Vec<Option<String>> = vec![None; schema.len()];
            let mut seen = HashSet::new();
            for (k, v) in row {
                let key = k.into().trim().to_string();
                let pos = match schema.position(&key) {
                    Some(p) if seen.insert(p) => p,
                    _ => {
                        return Err(DatasetError::SchemaDrift {
                            row: row_idx,
                            column: key,
                        })
                    }
                };
                cells[pos] = Some(v.into());
            }
            let mut record = Vec::with_capacity(cells.len());
            for (pos, cell) in cells.into_iter().enumerate() {
                match cell {
                    Some(c) => record.push(c),
                    None => {
                        return Err(DatasetError::SchemaDrift {
                            row: row_idx,
                            column: schema.columns[pos].clone(),
                        })
                    }
                }
            }
            records.push(record);
        }

        Ok(Self {
            schema: Arc::new(schema),
            records,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[String] {
        self.schema.columns()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.records.get(idx).map(|cells| Row {
            schema: &self.schema,
            cells,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.records.iter().map(move |cells| Row {
            schema: &self.schema,
            cells,
        })
    }

    /// Subset of this dataset's records by index, sharing the schema.
    pub(crate) fn select(&self, keep: impl IntoIterator<Item = usize>) -> Dataset {
        Dataset {
            schema: Arc::clone(&self.schema),
            records: keep
                .into_iter()
                .filter_map(|i| self.records.get(i).cloned())
                .collect(),
        }
    }
}
