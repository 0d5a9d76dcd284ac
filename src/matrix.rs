//! Labeled matrices: the upstream p-value matrix and the -log10 transform.

use std::collections::HashSet;

use crate::error::{DashError, Result};
use crate::store::Table;

pub const INDEX_COLUMN: &str = "index";

/// Dense row-major matrix with string labels on both axes. Missing cells are
/// `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    rows: Vec<String>,
    cols: Vec<String>,
    cells: Vec<Option<f64>>,
}

impl LabeledMatrix {
    pub fn new(rows: Vec<String>, cols: Vec<String>, cells: Vec<Option<f64>>) -> Result<Self> {
        if cells.len() != rows.len() * cols.len() {
            return Err(DashError::DataShape(format!(
                "{} cells for a {}x{} matrix",
                cells.len(),
                rows.len(),
                cols.len()
            )));
        }
        ensure_unique("row", &rows)?;
        ensure_unique("column", &cols)?;
        let cells = cells.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect();
        Ok(Self { rows, cols, cells })
    }

    /// All-missing matrix.
    pub fn empty(rows: Vec<String>, cols: Vec<String>) -> Result<Self> {
        let n = rows.len() * cols.len();
        Self::new(rows, cols, vec![None; n])
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn get(&self, r: usize, c: usize) -> Option<f64> {
        self.cells[r * self.cols.len() + c]
    }

    pub fn set(&mut self, r: usize, c: usize, value: Option<f64>) {
        let n = self.cols.len();
        self.cells[r * n + c] = value.filter(|x| !x.is_nan());
    }

    pub fn row_position(&self, label: &str) -> Option<usize> {
        self.rows.iter().position(|r| r == label)
    }

    pub fn col_position(&self, label: &str) -> Option<usize> {
        self.cols.iter().position(|c| c == label)
    }

    /// Cell by labels; `None` when missing or either label is unknown.
    pub fn value(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.row_position(row)?;
        let c = self.col_position(col)?;
        self.get(r, c)
    }

    pub fn non_missing_count(&self) -> usize {
        self.cells.iter().filter(|v| v.is_some()).count()
    }

    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new(vec![INDEX_COLUMN.to_string()], self.cols.clone());
        let n = self.cols.len();
        for (r, label) in self.rows.iter().enumerate() {
            table.push_row(vec![label.clone()], self.cells[r * n..(r + 1) * n].to_vec())?;
        }
        Ok(table)
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        if table.index_columns.len() != 1 {
            return Err(DashError::DataShape(format!(
                "matrix table needs one index column, found {:?}",
                table.index_columns
            )));
        }
        table.check_shape()?;
        let rows = table.rows.iter().map(|r| r.index[0].clone()).collect();
        let cells = table.rows.iter().flat_map(|r| r.values.iter().copied()).collect();
        Self::new(rows, table.value_columns.clone(), cells)
    }
}

fn ensure_unique(axis: &str, labels: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(DashError::DataShape(format!("duplicate {} label {:?}", axis, label)));
        }
    }
    Ok(())
}

/// Equality up to a relative tolerance; equal infinities compare equal.
pub fn approx_eq(a: f64, b: f64, rel_tol: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= rel_tol * a.abs().max(b.abs())
}

/// Square, symmetric matrix of pairwise test p-values. The diagonal is
/// undefined and never read.
#[derive(Debug, Clone, PartialEq)]
pub struct PValueMatrix {
    inner: LabeledMatrix,
}

impl PValueMatrix {
    pub fn new(matrix: LabeledMatrix, symmetry_tolerance: f64) -> Result<Self> {
        if matrix.rows() != matrix.cols() {
            return Err(DashError::DataShape(format!(
                "p-value matrix must be square with matching labels ({} rows, {} columns)",
                matrix.rows().len(),
                matrix.cols().len()
            )));
        }
        let n = matrix.rows().len();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                if let Some(p) = matrix.get(i, j) {
                    if !(0.0..=1.0).contains(&p) {
                        return Err(DashError::DataShape(format!(
                            "p-value {} at ({}, {}) outside [0, 1]",
                            p,
                            matrix.rows()[i],
                            matrix.cols()[j]
                        )));
                    }
                }
                if j > i {
                    let symmetric = match (matrix.get(i, j), matrix.get(j, i)) {
                        (Some(a), Some(b)) => approx_eq(a, b, symmetry_tolerance),
                        (None, None) => true,
                        _ => false,
                    };
                    if !symmetric {
                        return Err(DashError::DataShape(format!(
                            "p-value matrix is not symmetric at ({}, {})",
                            matrix.rows()[i],
                            matrix.cols()[j]
                        )));
                    }
                }
            }
        }
        Ok(Self { inner: matrix })
    }

    /// Build from variable labels and row-major p-values.
    pub fn from_rows(labels: &[&str], values: &[f64], symmetry_tolerance: f64) -> Result<Self> {
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let cells = values.iter().map(|v| Some(*v)).collect();
        Self::new(LabeledMatrix::new(labels.clone(), labels, cells)?, symmetry_tolerance)
    }

    pub fn from_table(table: &Table, symmetry_tolerance: f64) -> Result<Self> {
        Self::new(LabeledMatrix::from_table(table)?, symmetry_tolerance)
    }

    pub fn to_table(&self) -> Result<Table> {
        self.inner.to_table()
    }

    pub fn labels(&self) -> &[String] {
        self.inner.cols()
    }

    pub fn matrix(&self) -> &LabeledMatrix {
        &self.inner
    }
}

/// -log10 of the p-values, rows restricted to the base variables, with one
/// representative cell per unordered pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformMatrix {
    inner: LabeledMatrix,
}

impl TransformMatrix {
    pub(crate) fn from_matrix(inner: LabeledMatrix) -> Self {
        Self { inner }
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        Ok(Self { inner: LabeledMatrix::from_table(table)? })
    }

    pub fn to_table(&self) -> Result<Table> {
        self.inner.to_table()
    }

    pub fn rows(&self) -> &[String] {
        self.inner.rows()
    }

    pub fn cols(&self) -> &[String] {
        self.inner.cols()
    }

    pub fn get(&self, r: usize, c: usize) -> Option<f64> {
        self.inner.get(r, c)
    }

    pub fn value(&self, row: &str, col: &str) -> Option<f64> {
        self.inner.value(row, col)
    }

    pub fn non_missing_count(&self) -> usize {
        self.inner.non_missing_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_cell_count_mismatch() {
        let err = LabeledMatrix::new(vec!["A".into()], vec!["A".into(), "B".into()], vec![None]);
        assert!(matches!(err, Err(DashError::DataShape(_))));
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let err = LabeledMatrix::empty(vec!["A".into(), "A".into()], vec!["B".into()]);
        assert!(matches!(err, Err(DashError::DataShape(_))));
    }

    #[test]
    fn test_pvalue_matrix_requires_square() {
        let m = LabeledMatrix::empty(vec!["A".into()], vec!["A".into(), "B".into()]).unwrap();
        assert!(PValueMatrix::new(m, 1e-9).is_err());
    }

    #[test]
    fn test_pvalue_matrix_requires_matching_label_order() {
        let m = LabeledMatrix::empty(vec!["A".into(), "B".into()], vec!["B".into(), "A".into()]).unwrap();
        assert!(PValueMatrix::new(m, 1e-9).is_err());
    }

    #[test]
    fn test_pvalue_matrix_rejects_asymmetry() {
        let err = PValueMatrix::from_rows(&["A", "B"], &[1.0, 0.1, 0.2, 1.0], 1e-9);
        assert!(matches!(err, Err(DashError::DataShape(_))));
    }

    #[test]
    fn test_pvalue_matrix_rejects_out_of_range() {
        let err = PValueMatrix::from_rows(&["A", "B"], &[1.0, 1.5, 1.5, 1.0], 1e-9);
        assert!(matches!(err, Err(DashError::DataShape(_))));
    }

    #[test]
    fn test_pvalue_matrix_ignores_diagonal() {
        let m = PValueMatrix::from_rows(&["A", "B"], &[f64::NAN, 0.0, 0.0, 7.0], 1e-9).unwrap();
        assert_eq!(m.labels(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_table_conversion_keeps_order() {
        let m = PValueMatrix::from_rows(&["B", "A"], &[1.0, 0.3, 0.3, 1.0], 1e-9).unwrap();
        let table = m.to_table().unwrap();
        assert_eq!(table.index_columns, vec!["index".to_string()]);
        assert_eq!(table.rows[0].index, vec!["B".to_string()]);
        let back = PValueMatrix::from_table(&table, 1e-9).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(f64::INFINITY, f64::INFINITY, 0.0));
        assert!(approx_eq(1.0, 1.0 + 1e-12, 1e-9));
        assert!(!approx_eq(1.0, 1.1, 1e-9));
        assert!(!approx_eq(f64::INFINITY, 1.0, 1e-9));
    }
}
