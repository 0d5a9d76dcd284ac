use thiserror::Error;

use crate::panel::PanelId;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("data shape: {0}")]
    DataShape(String),
    #[error("no valid comparisons to correct significance level {raw_p}")]
    InsufficientData { raw_p: f64 },
    #[error("artifact persistence: {0}")]
    Persistence(String),
    #[error("unknown panel {0}")]
    UnknownPanel(PanelId),
}

impl DashError {
    pub fn kind(&self) -> &'static str {
        match self {
            DashError::DataShape(_) => "data_shape",
            DashError::InsufficientData { .. } => "insufficient_data",
            DashError::Persistence(_) => "persistence",
            DashError::UnknownPanel(_) => "unknown_panel",
        }
    }
}

impl From<std::io::Error> for DashError {
    fn from(err: std::io::Error) -> Self {
        DashError::Persistence(err.to_string())
    }
}

impl From<rusqlite::Error> for DashError {
    fn from(err: rusqlite::Error) -> Self {
        DashError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> Self {
        DashError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashError>;
