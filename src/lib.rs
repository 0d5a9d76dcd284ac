//! Pairwise significance ("Manhattan") pipeline for an exploratory data
//! dashboard.
//!
//! ```text
//! store ─► transform ─► flatten ─► (cached generation) ─► threshold ─► plot
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod flatten;
pub mod logging;
pub mod matrix;
pub mod panel;
pub mod plot;
pub mod selection;
pub mod store;
pub mod threshold;
pub mod transform;

pub use controller::{CacheDecision, GuardRejected, ManhattanController, RefreshOutcome};
pub use error::DashError;
pub use panel::{PanelId, PanelRegistry};
