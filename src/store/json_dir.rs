use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

use super::table::Table;
use super::{ArtifactName, ArtifactStore};
use crate::error::{DashError, Result};

/// One `<name>.json` file per artifact. Writes land in a temp file first and
/// are renamed over the old generation, so readers never see a half-written
/// table.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, name: &ArtifactName) -> PathBuf {
        self.dir.join(format!("{}.json", name.as_str()))
    }

    fn tmp_path_for(&self, name: &ArtifactName) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", name.as_str()))
    }

    fn write_tmp(&self, name: &ArtifactName, table: &Table) -> Result<PathBuf> {
        let tmp = self.tmp_path_for(name);
        fs::write(&tmp, table.to_json()?)?;
        Ok(tmp)
    }
}

impl ArtifactStore for JsonDirStore {
    fn load(&self, name: &ArtifactName) -> Result<Option<Table>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Table::from_json(&raw)
            .map(Some)
            .map_err(|e| DashError::Persistence(format!("{}: {}", path.display(), e)))
    }

    fn save(&mut self, name: &ArtifactName, table: &Table) -> Result<()> {
        let tmp = self.write_tmp(name, table)?;
        fs::rename(tmp, self.path_for(name))?;
        Ok(())
    }

    fn save_generation(&mut self, entries: &[(ArtifactName, Table)]) -> Result<()> {
        // Stage everything before publishing anything.
        let mut staged = Vec::with_capacity(entries.len());
        for (name, table) in entries {
            match self.write_tmp(name, table) {
                Ok(tmp) => staged.push((tmp, self.path_for(name))),
                Err(err) => {
                    for (tmp, _) in &staged {
                        let _ = fs::remove_file(tmp);
                    }
                    return Err(err);
                }
            }
        }
        let mut pending = staged.iter();
        while let Some((tmp, dest)) = pending.next() {
            if let Err(err) = fs::rename(tmp, dest) {
                let _ = fs::remove_file(tmp);
                for (rest, _) in pending.by_ref() {
                    let _ = fs::remove_file(rest);
                }
                return Err(err.into());
            }
        }
        Ok(())
    }
}
