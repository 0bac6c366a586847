//! Data-row loading: client-parsed CSV spreadsheets and remote record lists.

use crate::types::{DataRow, Result, TemplateError};
use log::debug;
use std::path::Path;

/// Load rows from a CSV file. The first line is the header; each
/// following line becomes one [`DataRow`] keyed by header name.
pub async fn load_rows_csv(path: impl AsRef<Path>) -> Result<Vec<DataRow>> {
    let path = path.as_ref().to_owned();

    let contents = tokio::fs::read_to_string(&path).await?;

    // CSV parsing is CPU-bound, spawn blocking
    let rows = tokio::task::spawn_blocking(move || {
        let mut reader = csv::Reader::from_reader(contents.as_bytes());
        let headers = reader.headers()?.clone();
        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result?;
            let mut row = DataRow::new();
            for (header, value) in headers.iter().zip(record.iter()) {
                row.insert(header.to_string(), value.to_string());
            }
            rows.push(row);
        }
        Ok::<_, TemplateError>(rows)
    })
    .await??;

    debug!("parsed {} data rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Fetch rows from a remote list endpoint returning a JSON array of flat
/// records. Scalar values are stringified; nested arrays/objects are
/// skipped since tokens can only substitute flat values.
pub async fn fetch_rows(url: &str) -> Result<Vec<DataRow>> {
    let records: Vec<serde_json::Map<String, serde_json::Value>> =
        reqwest::get(url).await?.error_for_status()?.json().await?;

    debug!("fetched {} data rows from {}", records.len(), url);
    Ok(records.into_iter().map(row_from_record).collect())
}

fn row_from_record(record: serde_json::Map<String, serde_json::Value>) -> DataRow {
    use serde_json::Value;

    let mut row = DataRow::new();
    for (key, value) in record {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            Value::Array(_) | Value::Object(_) => continue,
        };
        row.insert(key, text);
    }
    row
}
