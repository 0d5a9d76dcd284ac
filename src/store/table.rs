//! Format-agnostic tabular artifact: index columns plus numeric value columns.
//!
//! Every persisted artifact (p-values, log matrix, flattened logs) travels
//! through this shape. Missing cells are `None`; NaN is normalised to missing
//! on the way in, and infinities survive every backend.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DashError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub index: Vec<String>,
    #[serde(with = "cells")]
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub index_columns: Vec<String>,
    pub value_columns: Vec<String>,
    pub rows: Vec<TableRow>,
    /// Fingerprint of the table this one was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Table {
    pub fn new(index_columns: Vec<String>, value_columns: Vec<String>) -> Self {
        Self {
            index_columns,
            value_columns,
            rows: Vec::new(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn push_row(&mut self, index: Vec<String>, values: Vec<Option<f64>>) -> Result<()> {
        if index.len() != self.index_columns.len() || values.len() != self.value_columns.len() {
            return Err(DashError::DataShape(format!(
                "row has {} index / {} value cells, table expects {} / {}",
                index.len(),
                values.len(),
                self.index_columns.len(),
                self.value_columns.len()
            )));
        }
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        self.rows.push(TableRow { index, values });
        Ok(())
    }

    /// Verify every row matches the declared columns (tables read back from
    /// disk are not trusted).
    pub fn check_shape(&self) -> Result<()> {
        for (i, row) in self.rows.iter().enumerate() {
            if row.index.len() != self.index_columns.len()
                || row.values.len() != self.value_columns.len()
            {
                return Err(DashError::DataShape(format!("row {} does not match table header", i)));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let table: Table = serde_json::from_str(raw)?;
        table.check_shape()?;
        Ok(table)
    }
}

/// SHA-256 of the canonical JSON encoding, hex encoded.
pub fn fingerprint(table: &Table) -> Result<String> {
    let bytes = serde_json::to_vec(table)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

mod cells {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Num(f64),
        Text(String),
    }

    fn encode(value: &Option<f64>) -> Option<Cell> {
        match value {
            Some(x) if x.is_nan() => None,
            Some(x) if *x == f64::INFINITY => Some(Cell::Text("inf".to_string())),
            Some(x) if *x == f64::NEG_INFINITY => Some(Cell::Text("-inf".to_string())),
            Some(x) => Some(Cell::Num(*x)),
            None => None,
        }
    }

    pub fn serialize<S: Serializer>(values: &[Option<f64>], s: S) -> Result<S::Ok, S::Error> {
        let cells: Vec<Option<Cell>> = values.iter().map(encode).collect();
        cells.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Option<f64>>, D::Error> {
        let cells: Vec<Option<Cell>> = Vec::deserialize(d)?;
        cells
            .into_iter()
            .map(|cell| match cell {
                None => Ok(None),
                Some(Cell::Num(x)) => Ok(Some(x)),
                Some(Cell::Text(t)) => match t.as_str() {
                    "inf" => Ok(Some(f64::INFINITY)),
                    "-inf" => Ok(Some(f64::NEG_INFINITY)),
                    other => Err(D::Error::custom(format!("unknown cell value {:?}", other))),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::new(vec!["index".into()], vec!["A".into(), "B".into()]);
        t.push_row(vec!["A".into()], vec![None, Some(f64::INFINITY)]).unwrap();
        t.push_row(vec!["B".into()], vec![Some(1.5), Some(f64::NAN)]).unwrap();
        t
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut t = Table::new(vec!["index".into()], vec!["A".into()]);
        let err = t.push_row(vec!["A".into()], vec![None, None]).unwrap_err();
        assert!(matches!(err, DashError::DataShape(_)));
    }

    #[test]
    fn test_nan_is_stored_as_missing() {
        let t = sample();
        assert_eq!(t.rows[1].values[1], None);
    }

    #[test]
    fn test_json_keeps_infinity() {
        let t = sample();
        let json = t.to_json().unwrap();
        assert!(json.contains("\"inf\""));
        let back = Table::from_json(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_from_json_rejects_ragged_rows() {
        let raw = r#"{"index_columns":["index"],"value_columns":["A","B"],"rows":[{"index":["A"],"values":[1.0]}]}"#;
        assert!(Table::from_json(raw).is_err());
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(&sample()).unwrap();
        let b = fingerprint(&sample()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut other = sample();
        other.rows[1].values[0] = Some(1.6);
        assert_ne!(a, fingerprint(&other).unwrap());
    }

    #[test]
    fn test_source_survives_json_and_changes_fingerprint() {
        let plain = sample();
        assert!(!plain.to_json().unwrap().contains("source"));

        let derived = sample().with_source("abc123");
        let back = Table::from_json(&derived.to_json().unwrap()).unwrap();
        assert_eq!(back.source.as_deref(), Some("abc123"));
        assert_ne!(fingerprint(&plain).unwrap(), fingerprint(&derived).unwrap());
    }
}
