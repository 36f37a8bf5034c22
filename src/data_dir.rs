use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    record_dir::create_private_dir,
};

pub const CACHE_DIR_ENV_VAR: &str = "CRYPTAG_SCOPE_CACHE_DIR";

/// Root of everything the scope keeps on disk.
///
/// ```text
/// <root>/config.redb   settings and backend configs
/// <root>/rows/         cached rows, one record each
/// <root>/tags/         cached tag pairs, one record each
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    /// Resolve the cache directory from, in order of priority:
    /// 1. An explicit path (from --cache-dir)
    /// 2. The CRYPTAG_SCOPE_CACHE_DIR environment variable
    /// 3. The XDG cache directory (~/.cache/cryptag-scope/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(CACHE_DIR_ENV_VAR) {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("cryptag-scope")
                .get_cache_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG cache home directory".into(),
                    )
                })?
        };

        let dir = Self { root };
        for path in [dir.root.clone(), dir.rows_dir(), dir.tags_dir()] {
            create_private_dir(&path).map_err(|_| Error::DataDir(path))?;
        }

        Ok(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_db(&self) -> PathBuf {
        self.root.join("config.redb")
    }

    pub fn rows_dir(&self) -> PathBuf {
        self.root.join("rows")
    }

    pub fn tags_dir(&self) -> PathBuf {
        self.root.join("tags")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = CacheDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.config_db(), tmp.path().join("config.redb"));
    }

    #[test]
    fn subdirectories_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nested").join("cache");
        let dir = CacheDir::resolve(Some(&root)).unwrap();

        assert!(dir.rows_dir().is_dir());
        assert!(dir.tags_dir().is_dir());
        assert_eq!(dir.tags_dir(), root.join("tags"));
    }

    #[cfg(unix)]
    #[test]
    fn directories_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = CacheDir::resolve(Some(&tmp.path().join("c"))).unwrap();
        let mode = std::fs::metadata(dir.tags_dir())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
