//! Raw tabular data as exchanged between collaborators.
//!
//! A `TabularData` is a named-column grid of loosely-typed JSON values.
//! Scraped and queried sources are messy, so numeric access goes through a
//! cleaning step that strips currency markers, thousands separators and
//! citation brackets before parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ToolError};

/// A raw table: ordered column names plus rows of JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularData {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularData {
    /// Create an empty table with the given column names
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; the row must match the column count
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ToolError::parsing(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names, in declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Raw cell access
    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// A whole column as numeric values; cells that do not parse are `None`
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ToolError::parsing(format!("no column named {:?}", name)))?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).and_then(coerce_numeric))
            .collect())
    }

    /// A cell rendered as display text
    pub fn text_cell(&self, row: usize, name: &str) -> Option<String> {
        let idx = self.column_index(name)?;
        self.cell(row, idx).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Rows where both named columns parse as numbers, as (x, y) pairs
    pub fn paired_numeric(&self, x: &str, y: &str) -> Result<Vec<(f64, f64)>> {
        let xs = self.numeric_column(x)?;
        let ys = self.numeric_column(y)?;
        Ok(xs
            .into_iter()
            .zip(ys)
            .filter_map(|pair| match pair {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            })
            .collect())
    }

    /// Build a table from a JSON payload.
    ///
    /// Accepts either `{"columns": [...], "rows": [[...]]}` or an array of
    /// flat objects. Object keys are taken from the first record, sorted, so
    /// the column order is stable across fetches.
    pub fn from_json(value: &Value) -> Result<Self> {
        if let Some(obj) = value.as_object() {
            let columns: Vec<String> = obj
                .get("columns")
                .and_then(Value::as_array)
                .map(|cols| {
                    cols.iter()
                        .map(|c| c.as_str().unwrap_or_default().to_string())
                        .collect()
                })
                .ok_or_else(|| ToolError::parsing("object payload missing \"columns\" array"))?;
            let mut table = TabularData::new(columns);
            let rows = obj
                .get("rows")
                .and_then(Value::as_array)
                .ok_or_else(|| ToolError::parsing("object payload missing \"rows\" array"))?;
            for row in rows {
                let cells = row
                    .as_array()
                    .ok_or_else(|| ToolError::parsing("row is not an array"))?;
                table.push_row(cells.clone())?;
            }
            return Ok(table);
        }

        if let Some(records) = value.as_array() {
            let first = records
                .first()
                .and_then(Value::as_object)
                .ok_or_else(|| ToolError::empty_data("array payload has no object records"))?;
            let mut columns: Vec<String> = first.keys().cloned().collect();
            columns.sort();
            let mut table = TabularData::new(columns.clone());
            for record in records {
                let obj = record
                    .as_object()
                    .ok_or_else(|| ToolError::parsing("record is not an object"))?;
                let row = columns
                    .iter()
                    .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                    .collect();
                table.push_row(row)?;
            }
            return Ok(table);
        }

        Err(ToolError::parsing("payload is neither a table object nor a record array"))
    }
}

/// Parse a messy cell as a number.
///
/// Strings are cleaned of currency symbols, commas, citation brackets and
/// stray whitespace before parsing, so "$2,923[1]" comes back as 2923.0.
fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let mut cleaned = String::with_capacity(s.len());
            let mut in_bracket = false;
            for ch in s.chars() {
                match ch {
                    '[' => in_bracket = true,
                    ']' => in_bracket = false,
                    '0'..='9' | '.' | '-' if !in_bracket => cleaned.push(ch),
                    _ => {}
                }
            }
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TabularData {
        let mut t = TabularData::new(vec!["Rank".into(), "Title".into(), "Gross".into()]);
        t.push_row(vec![json!(1), json!("Avatar"), json!("$2,923[1]")])
            .unwrap();
        t.push_row(vec![json!(2), json!("Titanic"), json!("2,257")])
            .unwrap();
        t.push_row(vec![json!(3), json!("Unknown"), json!("n/a")])
            .unwrap();
        t
    }

    #[test]
    fn numeric_column_cleans_currency_and_citations() {
        let t = sample();
        let gross = t.numeric_column("gross").unwrap();
        assert_eq!(gross, vec![Some(2923.0), Some(2257.0), None]);
    }

    #[test]
    fn push_row_rejects_width_mismatch() {
        let mut t = TabularData::new(vec!["a".into()]);
        assert!(t.push_row(vec![json!(1), json!(2)]).is_err());
    }

    #[test]
    fn paired_numeric_drops_unparseable_rows() {
        let t = sample();
        let pairs = t.paired_numeric("Rank", "Gross").unwrap();
        assert_eq!(pairs, vec![(1.0, 2923.0), (2.0, 2257.0)]);
    }

    #[test]
    fn from_json_record_array_sorts_columns() {
        let payload = json!([
            {"b": 2, "a": 1},
            {"b": 4, "a": 3}
        ]);
        let t = TabularData::from_json(&payload).unwrap();
        assert_eq!(t.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn from_json_table_object_roundtrips() {
        let payload = json!({
            "columns": ["x", "y"],
            "rows": [[1, 2], [3, 4]]
        });
        let t = TabularData::from_json(&payload).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.numeric_column("y").unwrap(), vec![Some(2.0), Some(4.0)]);
    }

    #[test]
    fn from_json_rejects_scalars() {
        assert!(TabularData::from_json(&json!(42)).is_err());
    }
}
