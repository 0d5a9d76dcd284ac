//! Persisted tabular artifacts, loaded and saved whole by name.

pub mod json_dir;
pub mod sqlite;
pub mod table;

use std::collections::HashMap;
use std::fmt;

pub use json_dir::JsonDirStore;
pub use sqlite::SqliteStore;
pub use table::{fingerprint, Table, TableRow};

use crate::error::{DashError, Result};
use crate::panel::PanelId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn pvalues() -> Self {
        Self("pvalues".to_string())
    }

    /// The -log10 matrix of a panel. Panel 0 keeps the bare name.
    pub fn logs(panel: PanelId) -> Self {
        Self::scoped("logs", panel)
    }

    pub fn flattened_logs(panel: PanelId) -> Self {
        Self::scoped("flattened_logs", panel)
    }

    fn scoped(base: &str, panel: PanelId) -> Self {
        if panel.0 == 0 {
            Self(base.to_string())
        } else {
            Self(format!("{}.{}", base, panel.0))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whole-table read/write boundary. No partial or streaming access: a load
/// either yields a complete table or fails.
pub trait ArtifactStore {
    /// `Ok(None)` when the artifact has never been written.
    fn load(&self, name: &ArtifactName) -> Result<Option<Table>>;

    fn save(&mut self, name: &ArtifactName, table: &Table) -> Result<()>;

    /// Save several artifacts as one generation. Backends that can make this
    /// all-or-nothing override it.
    fn save_generation(&mut self, entries: &[(ArtifactName, Table)]) -> Result<()> {
        for (name, table) in entries {
            self.save(name, table)?;
        }
        Ok(())
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for Box<S> {
    fn load(&self, name: &ArtifactName) -> Result<Option<Table>> {
        (**self).load(name)
    }

    fn save(&mut self, name: &ArtifactName, table: &Table) -> Result<()> {
        (**self).save(name, table)
    }

    fn save_generation(&mut self, entries: &[(ArtifactName, Table)]) -> Result<()> {
        (**self).save_generation(entries)
    }
}

/// In-process store for tests and the `memory` backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<ArtifactName, Table>,
    writes: u64,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful table writes so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Make every subsequent write fail with a persistence error.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn remove(&mut self, name: &ArtifactName) -> Option<Table> {
        self.tables.remove(name)
    }
}

impl ArtifactStore for MemoryStore {
    fn load(&self, name: &ArtifactName) -> Result<Option<Table>> {
        Ok(self.tables.get(name).cloned())
    }

    fn save(&mut self, name: &ArtifactName, table: &Table) -> Result<()> {
        if self.read_only {
            return Err(DashError::Persistence(format!("store is read-only, cannot write {}", name)));
        }
        self.tables.insert(name.clone(), table.clone());
        self.writes += 1;
        Ok(())
    }

    fn save_generation(&mut self, entries: &[(ArtifactName, Table)]) -> Result<()> {
        if self.read_only {
            return Err(DashError::Persistence("store is read-only".to_string()));
        }
        for (name, table) in entries {
            self.save(name, table)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_scoped_names() {
        assert_eq!(ArtifactName::logs(PanelId(0)).as_str(), "logs");
        assert_eq!(ArtifactName::logs(PanelId(3)).as_str(), "logs.3");
        assert_eq!(ArtifactName::flattened_logs(PanelId(0)).as_str(), "flattened_logs");
        assert_eq!(ArtifactName::pvalues().to_string(), "pvalues");
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let mut store = MemoryStore::new();
        let t = Table::new(vec!["index".into()], vec!["A".into()]);
        store.save(&ArtifactName::pvalues(), &t).unwrap();
        assert_eq!(store.writes(), 1);
        assert_eq!(store.load(&ArtifactName::pvalues()).unwrap(), Some(t));
    }

    #[test]
    fn test_read_only_generation_writes_nothing() {
        let mut store = MemoryStore::new();
        store.set_read_only(true);
        let t = Table::new(vec!["index".into()], vec![]);
        let err = store
            .save_generation(&[(ArtifactName::logs(PanelId(0)), t)])
            .unwrap_err();
        assert!(matches!(err, DashError::Persistence(_)));
        assert_eq!(store.writes(), 0);
        assert!(store.load(&ArtifactName::logs(PanelId(0))).unwrap().is_none());
    }
}
