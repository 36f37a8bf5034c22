use std::{
    fs,
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

const RECORD_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".record-";
const TEMP_SUFFIX: &str = ".tmp";

/// Temp files older than this belong to a writer that died mid-write.
const STALE_TEMP_AGE: Duration = Duration::from_secs(10 * 60);

/// A directory holding one JSON file per record.
///
/// File names are the percent-encoded record key, so any key string is
/// safe to use. Each write goes through its own uniquely named temporary
/// file and a rename, so concurrent readers never see half a record and
/// concurrent writers, even in other processes, never share a temp file.
#[derive(Debug, Clone)]
pub struct RecordDir<T> {
    dir: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> RecordDir<T> {
    pub fn open(dir: &Path) -> Result<Self> {
        create_private_dir(dir)?;
        let records = Self {
            dir: dir.to_path_buf(),
            _record: PhantomData,
        };
        records.remove_stale_temp_files(STALE_TEMP_AGE)?;
        Ok(records)
    }

    fn remove_stale_temp_files(&self, max_age: Duration) -> Result<()> {
        let now = SystemTime::now();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !(name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)) {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age >= max_age {
                tracing::debug!(file = name, "removing stale temp file");
                if let Err(e) = fs::remove_file(entry.path()) {
                    tracing::warn!(file = name, "failed to remove temp file: {e}");
                }
            }
        }
        Ok(())
    }

    fn record_path(&self, key: &str) -> PathBuf {
        let name = utf8_percent_encode(key, NON_ALPHANUMERIC).to_string();
        self.dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    pub fn put(&self, key: &str, record: &T) -> Result<()> {
        let path = self.record_path(key);
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, record)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<T>> {
        let path = self.record_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every record, sorted by file name. Files that fail to parse
    /// are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<T>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str())
                == Some(RECORD_EXTENSION)
            {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = fs::read(&path)?;
            match serde_json::from_slice(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        "skipping unreadable record: {e}"
                    );
                }
            }
        }
        Ok(records)
    }
}

/// Create `dir` and its parents, owner-only on Unix.
pub fn create_private_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}
