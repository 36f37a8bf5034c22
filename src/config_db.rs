use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::{config::BackendConfig, error::Result};

const BACKENDS: TableDefinition<&str, &str> = TableDefinition::new("backends");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(BACKENDS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Backends --

    /// Store a backend config under its name, replacing any previous one.
    /// Returns whether a config with that name already existed.
    pub fn save_backend_config(&self, config: &BackendConfig) -> Result<bool> {
        let json = serde_json::to_string(config)?;
        let txn = self.db.begin_write()?;
        let existed = {
            let mut table = txn.open_table(BACKENDS)?;
            table.insert(config.name.as_str(), json.as_str())?.is_some()
        };
        txn.commit()?;
        Ok(existed)
    }

    pub fn load_backend_config(
        &self,
        name: &str,
    ) -> Result<Option<BackendConfig>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BACKENDS)?;
        let Some(guard) = table.get(name)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(guard.value())?))
    }

    pub fn list_backend_configs(&self) -> Result<Vec<BackendConfig>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BACKENDS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            result.push(serde_json::from_str(v.value())?);
        }
        Ok(result)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }
}

impl std::fmt::Debug for ConfigDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDb").finish_non_exhaustive()
    }
}
