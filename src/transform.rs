//! p-value matrix -> deduplicated -log10 matrix.

use std::collections::HashMap;

use crate::error::{DashError, Result};
use crate::matrix::{approx_eq, LabeledMatrix, PValueMatrix, TransformMatrix};

/// -log10(p). A p-value of exactly 0 maps to +inf and is kept.
pub fn neg_log10(p: f64) -> f64 {
    -p.log10()
}

/// Transform `pvalues` restricted to the `base` rows (all columns kept).
///
/// Cells are visited row-major in label order; for each pair whose mirrored
/// cell also lies inside the restricted matrix and carries an equal p-value,
/// the mirror is blanked so the first-visited cell represents the pair. The
/// diagonal is always blanked. Duplicate base names collapse to their first
/// occurrence.
pub fn pairwise_transform(
    pvalues: &PValueMatrix,
    base: &[String],
    tolerance: f64,
) -> Result<TransformMatrix> {
    let src = pvalues.matrix();
    let labels = pvalues.labels();
    let col_pos: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let mut rows: Vec<String> = Vec::with_capacity(base.len());
    let mut missing = Vec::new();
    for name in base {
        if !col_pos.contains_key(name.as_str()) {
            missing.push(name.clone());
        } else if !rows.contains(name) {
            rows.push(name.clone());
        }
    }
    if !missing.is_empty() {
        return Err(DashError::DataShape(format!(
            "base variables not in p-value matrix: {:?}",
            missing
        )));
    }

    // Source row of each transform row. Rows and columns share labels in a
    // validated p-value matrix.
    let src_rows: Vec<usize> = rows.iter().map(|r| col_pos[r.as_str()]).collect();
    let row_pos: HashMap<&str, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let mut out = LabeledMatrix::empty(rows.clone(), labels.to_vec())?;
    for (r, &sr) in src_rows.iter().enumerate() {
        for c in 0..labels.len() {
            if sr != c {
                out.set(r, c, src.get(sr, c).map(neg_log10));
            }
        }
    }

    for (r, &sr) in src_rows.iter().enumerate() {
        for (c, col) in labels.iter().enumerate() {
            if sr == c {
                continue;
            }
            let Some(&mr) = row_pos.get(col.as_str()) else {
                continue;
            };
            if out.get(r, c).is_none() || out.get(mr, sr).is_none() {
                continue;
            }
            if let (Some(p), Some(mirror)) = (src.get(sr, c), src.get(c, sr)) {
                if approx_eq(p, mirror, tolerance) {
                    out.set(mr, sr, None);
                }
            }
        }
    }

    Ok(TransformMatrix::from_matrix(out))
}
