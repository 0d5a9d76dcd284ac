//! Bonferroni-style corrected significance threshold on the -log10 scale.

use crate::error::{DashError, Result};
use crate::matrix::TransformMatrix;
use crate::plot::AxisScale;

/// A raw significance level known to be finite and > 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceLevel(f64);

impl SignificanceLevel {
    pub fn new(raw: f64) -> Option<Self> {
        (raw.is_finite() && raw > 0.0).then_some(Self(raw))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceThreshold {
    pub raw_p: f64,
    pub comparison_count: usize,
    pub corrected_p: f64,
    /// -log10(corrected_p); where the threshold line is drawn
    pub value: f64,
}

/// Non-missing cells across the whole log matrix.
pub fn comparison_count(logs: &TransformMatrix) -> usize {
    logs.non_missing_count()
}

pub fn threshold_for_count(level: SignificanceLevel, count: usize) -> Result<SignificanceThreshold> {
    if count == 0 {
        return Err(DashError::InsufficientData { raw_p: level.value() });
    }
    let corrected_p = level.value() / count as f64;
    Ok(SignificanceThreshold {
        raw_p: level.value(),
        comparison_count: count,
        corrected_p,
        value: -corrected_p.log10(),
    })
}

pub fn corrected_threshold(level: SignificanceLevel, logs: &TransformMatrix) -> Result<SignificanceThreshold> {
    threshold_for_count(level, comparison_count(logs))
}

impl SignificanceThreshold {
    /// Annotation y in axis units. A log axis positions annotations by
    /// log10 of the data value, so this is log10 of the threshold (which is
    /// already a -log10 quantity), not another -log10. A non-positive
    /// threshold cannot be placed there and stays at its linear value.
    pub fn annotation_y(&self, scale: AxisScale) -> f64 {
        match scale {
            AxisScale::Log if self.value > 0.0 => self.value.log10(),
            _ => self.value,
        }
    }

    pub fn label(&self) -> String {
        format!("{:.6}", self.value)
    }
}
