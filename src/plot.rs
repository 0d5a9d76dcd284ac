//! Plot description handed to the presentation layer.

use serde::{Deserialize, Serialize};

use crate::flatten::FlattenedSeries;
use crate::threshold::SignificanceThreshold;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    Linear,
    Log,
}

impl AxisScale {
    pub fn from_flag(log_scale: bool) -> Self {
        if log_scale {
            AxisScale::Log
        } else {
            AxisScale::Linear
        }
    }
}

/// One marker. `y` is -log10(p); an infinite value serializes as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub x: usize,
    pub first: String,
    pub second: String,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdLine {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub show_arrow: bool,
    pub arrow_head: u8,
    pub ax: i32,
    pub ay: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotDescription {
    pub mode: &'static str,
    pub points: Vec<PlotPoint>,
    pub threshold_line: ThresholdLine,
    pub annotation: Annotation,
    pub y_axis_scale: AxisScale,
    pub x_axis_title: &'static str,
    pub y_axis_title: &'static str,
}

/// Points are emitted in reverse flatten order: the last flattened pair is
/// drawn leftmost.
pub fn assemble_plot(
    series: &FlattenedSeries,
    threshold: &SignificanceThreshold,
    scale: AxisScale,
) -> PlotDescription {
    let points = series
        .entries()
        .iter()
        .rev()
        .enumerate()
        .map(|(x, e)| PlotPoint {
            x,
            first: e.first.clone(),
            second: e.second.clone(),
            y: e.value,
        })
        .collect();

    PlotDescription {
        mode: "markers",
        points,
        threshold_line: ThresholdLine {
            x0: 0.0,
            x1: series.len().saturating_sub(1) as f64,
            y: threshold.value,
        },
        annotation: Annotation {
            x: 0.0,
            y: threshold.annotation_y(scale),
            text: threshold.label(),
            show_arrow: true,
            arrow_head: 7,
            ax: -50,
            ay: 0,
        },
        y_axis_scale: scale,
        x_axis_title: "variable",
        y_axis_title: "-log10(p)",
    }
}
