use crate::error::Result;
use crate::store::{ArtifactStore, JsonDirStore, MemoryStore, SqliteStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Json,
    Memory,
}

impl StoreBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(StoreBackend::Sqlite),
            "json" => Some(StoreBackend::Json),
            "memory" | "mem" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub store_backend: StoreBackend,
    pub sqlite_path: String,
    pub artifact_dir: String,
    /// Significance level pre-filled in the p-value input
    pub default_pvalue: f64,
    /// Increment of the p-value input widget
    pub pvalue_step: f64,
    /// Relative tolerance for the p-value matrix symmetry check
    pub symmetry_tolerance: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Sqlite,
            sqlite_path: "dashboard.sqlite".to_string(),
            artifact_dir: "artifacts".to_string(),
            default_pvalue: 0.05,
            pvalue_step: 0.0001,
            symmetry_tolerance: 1e-9,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            store_backend: std::env::var("STORE_BACKEND")
                .ok()
                .and_then(|v| StoreBackend::parse(&v))
                .unwrap_or(d.store_backend),
            sqlite_path: std::env::var("SQLITE_PATH").unwrap_or(d.sqlite_path),
            artifact_dir: std::env::var("ARTIFACT_DIR").unwrap_or(d.artifact_dir),
            default_pvalue: std::env::var("DEFAULT_PVALUE").ok().and_then(|v| v.parse().ok()).unwrap_or(d.default_pvalue),
            pvalue_step: std::env::var("PVALUE_STEP").ok().and_then(|v| v.parse().ok()).unwrap_or(d.pvalue_step),
            symmetry_tolerance: std::env::var("SYMMETRY_TOLERANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|t: &f64| t.is_finite() && *t >= 0.0)
                .unwrap_or(d.symmetry_tolerance),
        }
    }
}

/// Open the artifact store selected by `cfg.store_backend`.
pub fn open_store(cfg: &DashboardConfig) -> Result<Box<dyn ArtifactStore>> {
    let store: Box<dyn ArtifactStore> = match cfg.store_backend {
        StoreBackend::Sqlite => {
            let mut store = SqliteStore::new(&cfg.sqlite_path)?;
            store.init()?;
            Box::new(store)
        }
        StoreBackend::Json => Box::new(JsonDirStore::open(&cfg.artifact_dir)?),
        StoreBackend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(StoreBackend::parse("SQLite"), Some(StoreBackend::Sqlite));
        assert_eq!(StoreBackend::parse(" json "), Some(StoreBackend::Json));
        assert_eq!(StoreBackend::parse("mem"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("feather"), None);
    }

    #[test]
    fn test_defaults_match_input_widget() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.default_pvalue, 0.05);
        assert_eq!(cfg.pvalue_step, 0.0001);
    }

    #[test]
    fn test_open_memory_store() {
        let cfg = DashboardConfig {
            store_backend: StoreBackend::Memory,
            ..Default::default()
        };
        let store = open_store(&cfg).unwrap();
        assert!(store.load(&crate::store::ArtifactName::pvalues()).unwrap().is_none());
    }
}
