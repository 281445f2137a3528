// src/dataset/load.rs
use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, info};

use super::Dataset;

/// On-disk format of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Json,
}

impl DataFormat {
    /// Guess from the file extension (`.csv`, `.json`).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(DataFormat::Csv),
            "json" => Some(DataFormat::Json),
            _ => None,
        }
    }
}

/// How JSON records map onto flat rows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonLayout {
    /// Every record is a flat object of scalar values.
    #[default]
    Flat,
    /// Records carry a nested array (e.g. `values: [{year, count}]`) that is
    /// pivoted into one column per `key`, holding `value`.
    Series {
        field: String,
        key: String,
        value: String,
    },
}

/// Read a CSV with a header row from any reader.
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // ragged records are reported by Dataset::new with their index
        .from_reader(reader);

    let header: Vec<String> = rdr
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        // skip fully blank lines
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect());
    }
    debug!(columns = header.len(), rows = records.len(), "parsed CSV");

    Dataset::new(header, records).map_err(Into::into)
}

#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path.as_ref()))?;
    let ds = read_csv(file)
        .with_context(|| format!("Failed to load CSV file: {:?}", path.as_ref()))?;
    info!(rows = ds.len(), columns = ds.columns().len(), "loaded CSV");
    Ok(ds)
}

fn scalar_to_cell(v: &Value) -> Option<String> {
    match v {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Convert an already-parsed JSON array of records into a dataset.
pub fn parse_json(value: &Value, layout: &JsonLayout) -> Result<Dataset> {
    let records = value
        .as_array()
        .ok_or_else(|| anyhow!("expected a JSON array of records"))?;

    let mut rows: Vec<Vec<(String, String)>> = Vec::with_capacity(records.len());
    for (idx, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| anyhow!("record {} is not a JSON object", idx))?;
        let mut row = Vec::with_capacity(obj.len());
        for (k, v) in obj {
            match (layout, scalar_to_cell(v)) {
                (_, Some(cell)) => row.push((k.clone(), cell)),
                (JsonLayout::Series { field, key, value: value_key }, None) if field == k => {
                    let points = v.as_array().ok_or_else(|| {
                        anyhow!("record {}: series field `{}` is not an array", idx, k)
                    })?;
                    for (p_idx, point) in points.iter().enumerate() {
                        let column = point.get(key).and_then(scalar_to_cell).ok_or_else(|| {
                            anyhow!("record {}: point {} has no scalar `{}`", idx, p_idx, key)
                        })?;
                        let cell = point
                            .get(value_key)
                            .and_then(scalar_to_cell)
                            .unwrap_or_default();
                        row.push((column, cell));
                    }
                }
                (_, None) => bail!("record {}: field `{}` is not a scalar value", idx, k),
            }
        }
        rows.push(row);
    }

    Dataset::from_rows(rows).map_err(Into::into)
}

#[tracing::instrument(level = "info", skip(path, layout), fields(path = %path.as_ref().display()))]
pub fn load_json<P: AsRef<Path>>(path: P, layout: &JsonLayout) -> Result<Dataset> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open JSON file: {:?}", path.as_ref()))?;
    let value: Value = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse JSON file: {:?}", path.as_ref()))?;
    let ds = parse_json(&value, layout)
        .with_context(|| format!("Failed to load JSON file: {:?}", path.as_ref()))?;
    info!(rows = ds.len(), columns = ds.columns().len(), "loaded JSON");
    Ok(ds)
}

/// Load a dataset, taking the format from `format` or else the file extension.
pub fn load_path<P: AsRef<Path>>(
    path: P,
    format: Option<DataFormat>,
    layout: &JsonLayout,
) -> Result<Dataset> {
    let path = path.as_ref();
    let format = format
        .or_else(|| DataFormat::from_path(path))
        .ok_or_else(|| anyhow!("cannot infer data format of {:?}; set `format`", path))?;
    match format {
        DataFormat::Csv => load_csv(path),
        DataFormat::Json => load_json(path, layout),
    }
}
