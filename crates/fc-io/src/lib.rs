#![forbid(unsafe_code)]

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use fc_chain::FilterChain;
use fc_types::{Row, Scalar};
use fc_view::DisplayNames;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("json rows must be an array of objects")]
    NotAnArray,
    #[error("json row {index} is not an object")]
    NotAnObject { index: usize },
    #[error("upstream payload reported status {0:?}")]
    UpstreamStatus(String),
    #[error("payload has no table named {0:?}")]
    MissingTab(String),
    #[error("payload contains no tables")]
    NoTables,
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Rows together with the column order they were loaded in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn read_csv_str(input: &str) -> Result<Table, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let headers = reader.headers().cloned().map_err(IoError::from)?;

    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let columns = headers.iter().map(str::to_owned).collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), parse_scalar(record.get(idx).unwrap_or_default())))
            .collect::<Row>();
        rows.push(row);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(rows = rows.len(), columns = columns.len(), "read csv rows");

    Ok(Table { columns, rows })
}

/// Reads a JSON array of flat objects. Column order is the order keys are
/// first seen, starting with the first object.
pub fn read_json_str(input: &str) -> Result<Table, IoError> {
    let value: Value = serde_json::from_str(input)?;
    table_from_value(value)
}

/// Reads a tabbed payload of the shape
/// `{"status": "success", "data": {"<tab>": [rows...], ...}}`.
/// Tabs keep their payload order.
pub fn read_json_tables(input: &str) -> Result<Vec<(String, Table)>, IoError> {
    let value: Value = serde_json::from_str(input)?;
    tables_from_envelope(value)
}

/// Loads a table from disk, dispatching on the file extension. For tabbed
/// JSON payloads `tab` picks the table; the first one is used otherwise.
pub fn read_path(path: &Path, tab: Option<&str>) -> Result<Table, IoError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => {
            let input = std::fs::read_to_string(path)?;
            read_csv_str(&input)
        }
        "json" => {
            let input = std::fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&input)?;
            if value.is_array() {
                return table_from_value(value);
            }
            let mut tables = tables_from_envelope(value)?;
            match tab {
                Some(name) => tables
                    .into_iter()
                    .find(|(tab_name, _)| tab_name == name)
                    .map(|(_, table)| table)
                    .ok_or_else(|| IoError::MissingTab(name.to_owned())),
                None => {
                    if tables.is_empty() {
                        return Err(IoError::NoTables);
                    }
                    Ok(tables.swap_remove(0).1)
                }
            }
        }
        other => Err(IoError::UnsupportedFormat(if other.is_empty() {
            path.display().to_string()
        } else {
            other.to_owned()
        })),
    }
}

fn table_from_value(value: Value) -> Result<Table, IoError> {
    let Value::Array(items) = value else {
        return Err(IoError::NotAnArray);
    };

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = item else {
            return Err(IoError::NotAnObject { index });
        };

        if index == 0 {
            columns = fields.keys().cloned().collect();
        }

        let mut row = Row::new();
        for (key, field) in fields {
            row.insert(key, json_to_scalar(field));
        }
        rows.push(row);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(rows = rows.len(), columns = columns.len(), "read json rows");

    Ok(Table { columns, rows })
}

fn tables_from_envelope(value: Value) -> Result<Vec<(String, Table)>, IoError> {
    let Value::Object(mut envelope) = value else {
        return Err(IoError::NotAnArray);
    };

    if let Some(status) = envelope.get("status").and_then(Value::as_str) {
        if status != "success" {
            return Err(IoError::UpstreamStatus(status.to_owned()));
        }
    }

    let Some(Value::Object(data)) = envelope.remove("data") else {
        return Err(IoError::NoTables);
    };

    data.into_iter()
        .map(|(name, rows)| table_from_value(rows).map(|table| (name, table)))
        .collect()
}

fn json_to_scalar(value: Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Bool(v) => Scalar::Bool(v),
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int64)
            .or_else(|| n.as_f64().map(Scalar::Float64))
            .unwrap_or(Scalar::Null),
        Value::String(s) => Scalar::Utf8(s),
        nested @ (Value::Array(_) | Value::Object(_)) => Scalar::Utf8(nested.to_string()),
    }
}

/// Types a CSV cell only when the typed value renders back to the same
/// text, so `007` or `3.50` stay strings and compare as written.
fn parse_scalar(field: &str) -> Scalar {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Scalar::Null;
    }

    let candidate = if let Ok(value) = trimmed.parse::<i64>() {
        Scalar::Int64(value)
    } else if let Ok(value) = trimmed.parse::<f64>() {
        Scalar::Float64(value)
    } else if let Ok(value) = trimmed.parse::<bool>() {
        Scalar::Bool(value)
    } else {
        return Scalar::Utf8(trimmed.to_owned());
    };

    if candidate.to_text() == trimmed {
        candidate
    } else {
        Scalar::Utf8(trimmed.to_owned())
    }
}

/// Writes `columns` of `rows` as CSV, using display names for the header.
pub fn write_csv_string(
    rows: &[Row],
    columns: &[String],
    names: &DisplayNames,
) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(columns.iter().map(|column| names.get(column)))?;

    for row in rows {
        writer.write_record(columns.iter().map(|column| row.text(column).into_owned()))?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;

    #[cfg(feature = "tracing")]
    tracing::debug!(rows = rows.len(), columns = columns.len(), bytes = bytes.len(), "wrote csv export");

    Ok(String::from_utf8(bytes)?)
}

/// Parses a chain from its JSON array form.
pub fn read_chain_json(input: &str) -> Result<FilterChain, IoError> {
    Ok(serde_json::from_str(input)?)
}
