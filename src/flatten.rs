//! Matrix -> ordered ((row, column), value) series.

use crate::error::{DashError, Result};
use crate::matrix::TransformMatrix;
use crate::store::Table;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntry {
    pub first: String,
    pub second: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlattenedSeries {
    entries: Vec<FlatEntry>,
}

/// Visit (row x column) in the matrix's label order and keep non-missing
/// cells. Downstream point placement relies on this order.
pub fn flatten(logs: &TransformMatrix) -> FlattenedSeries {
    let mut entries = Vec::with_capacity(logs.non_missing_count());
    for (r, row) in logs.rows().iter().enumerate() {
        for (c, col) in logs.cols().iter().enumerate() {
            if let Some(value) = logs.get(r, c) {
                entries.push(FlatEntry {
                    first: row.clone(),
                    second: col.clone(),
                    value,
                });
            }
        }
    }
    FlattenedSeries { entries }
}

impl FlattenedSeries {
    pub fn entries(&self) -> &[FlatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new(
            vec!["first".to_string(), "second".to_string()],
            vec!["value".to_string()],
        );
        for e in &self.entries {
            table.push_row(vec![e.first.clone(), e.second.clone()], vec![Some(e.value)])?;
        }
        Ok(table)
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        if table.index_columns.len() != 2 || table.value_columns.len() != 1 {
            return Err(DashError::DataShape(format!(
                "flattened table needs two index columns and one value column, found {:?} / {:?}",
                table.index_columns, table.value_columns
            )));
        }
        table.check_shape()?;
        let entries = table
            .rows
            .iter()
            .filter_map(|row| {
                row.values[0].map(|value| FlatEntry {
                    first: row.index[0].clone(),
                    second: row.index[1].clone(),
                    value,
                })
            })
            .collect();
        Ok(Self { entries })
    }
}
