use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    backend::{Backend, LocalBackend},
    config_db::ConfigDb,
    data_dir::CacheDir,
    error::{Error, Result},
};

pub const SERVER_INFO_ENV_VAR: &str = "CRYPTAG_SCOPE_SERVER_INFO";
pub const SERVER_INFO_SETTING: &str = "server_info";
pub const DEFAULT_BACKEND_NAME: &str = "webserver-scope";

/// Backend location and credentials as the host settings carry them:
/// `<baseURL>#<authToken>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub base_url: String,
    pub auth_token: String,
}

impl ServerInfo {
    /// Split on the first `#`. Anything after it, further `#`s included,
    /// is the token.
    ///
    /// # Examples
    ///
    /// ```
    /// use cryptag_scope::config::ServerInfo;
    ///
    /// let info = ServerInfo::parse("https://example.com#abc#def").unwrap();
    /// assert_eq!(info.base_url, "https://example.com");
    /// assert_eq!(info.auth_token, "abc#def");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let Some((base_url, auth_token)) = s.trim().split_once('#') else {
            return Err(Error::Config(
                "server info must look like <baseURL>#<authToken>".into(),
            ));
        };
        if base_url.is_empty() {
            return Err(Error::Config("server base URL is empty".into()));
        }
        Ok(Self {
            base_url: base_url.to_string(),
            auth_token: auth_token.to_string(),
        })
    }
}

impl FromStr for ServerInfo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.base_url, self.auth_token)
    }
}

/// Persisted description of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub base_url: String,
    pub auth_token: String,
}

impl BackendConfig {
    pub fn from_server_info(name: &str, info: &ServerInfo) -> Self {
        Self {
            name: name.to_string(),
            base_url: info.base_url.clone(),
            auth_token: info.auth_token.clone(),
        }
    }

    /// Data directory for backends that live on this machine: a
    /// `file://` URL or an absolute path.
    pub fn local_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.base_url.strip_prefix("file://") {
            return Some(PathBuf::from(path));
        }
        let path = Path::new(&self.base_url);
        path.is_absolute().then(|| path.to_path_buf())
    }

    pub fn open(&self) -> Result<Arc<dyn Backend>> {
        match self.local_path() {
            Some(path) => Ok(Arc::new(LocalBackend::open(&self.name, &path)?)),
            None => Err(Error::Config(format!(
                "unsupported backend URL for '{}': {}",
                self.name, self.base_url
            ))),
        }
    }
}

/// Everything the scope needs to run, fixed at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeConfig {
    pub cache_dir: CacheDir,
    pub backend: BackendConfig,
}

impl ScopeConfig {
    /// Work out the backend config, in order of priority:
    /// 1. Explicit server info (from --server-info or CRYPTAG_SCOPE_SERVER_INFO)
    /// 2. The backend config stored in config.redb
    /// 3. The server info setting stored in config.redb
    ///
    /// Nothing is written. With none of the three available the scope
    /// cannot run.
    pub fn lookup(
        cache_dir: CacheDir,
        config_db: &ConfigDb,
        explicit_server_info: Option<&str>,
    ) -> Result<Self> {
        let backend = if let Some(raw) = explicit_server_info {
            let info = ServerInfo::parse(raw)?;
            BackendConfig::from_server_info(DEFAULT_BACKEND_NAME, &info)
        } else if let Some(stored) =
            config_db.load_backend_config(DEFAULT_BACKEND_NAME)?
        {
            stored
        } else if let Some(raw) = config_db.get_setting(SERVER_INFO_SETTING)? {
            let info = ServerInfo::parse(&raw)?;
            BackendConfig::from_server_info(DEFAULT_BACKEND_NAME, &info)
        } else {
            return Err(Error::ConfigMissing(format!(
                "no server info; pass --server-info or set {SERVER_INFO_ENV_VAR}"
            )));
        };

        Ok(Self { cache_dir, backend })
    }

    /// Like [`lookup`](Self::lookup), then persist what was found:
    /// explicit server info replaces the stored setting and backend
    /// config, and a backend config is created from the stored setting
    /// when there is none yet.
    pub fn resolve(
        cache_dir: CacheDir,
        config_db: &ConfigDb,
        explicit_server_info: Option<&str>,
    ) -> Result<Self> {
        let config = Self::lookup(cache_dir, config_db, explicit_server_info)?;

        if let Some(raw) = explicit_server_info {
            let info = ServerInfo::parse(raw)?;
            config_db.set_setting(SERVER_INFO_SETTING, &info.to_string())?;
            config_db.save_backend_config(&config.backend)?;
        } else if config_db
            .load_backend_config(DEFAULT_BACKEND_NAME)?
            .is_none()
        {
            tracing::info!("no stored backend config, creating one");
            config_db.save_backend_config(&config.backend)?;
        }

        Ok(config)
    }
}
