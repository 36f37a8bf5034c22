//! cryptag-scope - search CrypTag notes, passwords and files by tag.
//!
//! A search scope answers queries from a desktop search host. Query words
//! are plaintext tags; every result row must carry all of them, plus the
//! tags of the department being searched. Rows come from a CrypTag
//! backend, and the backend's tag pairs are mirrored into a local cache
//! on every search.
//!
//! # Quick start
//!
//! ```no_run
//! use cryptag_scope::{CacheDir, ConfigDb, Scope, ScopeConfig};
//! use cryptag_scope::reply::CollectingReply;
//! use tokio_util::sync::CancellationToken;
//!
//! let cache_dir = CacheDir::resolve(None).unwrap();
//! let config_db = ConfigDb::open(&cache_dir.config_db()).unwrap();
//! let config =
//!     ScopeConfig::resolve(cache_dir, &config_db, Some("/srv/cryptag#token"))
//!         .unwrap();
//!
//! let scope = Scope::new();
//! scope.init(config).unwrap();
//!
//! let mut reply = CollectingReply::default();
//! scope
//!     .search("bank", "Passwords", &mut reply, &CancellationToken::new())
//!     .unwrap();
//! for r in &reply.results {
//!     println!("{}", r.title());
//! }
//! ```

pub mod backend;
pub mod config;
pub mod config_db;
pub mod data_dir;
pub mod department;
pub mod error;
pub mod format;
pub mod mcp;
pub mod preview;
pub mod query;
pub mod record_dir;
pub mod reply;
pub mod row;
pub mod scope;
pub mod tag_cache;

pub use backend::{Backend, BackendClient, LocalBackend, RefreshOutcome};
pub use config::{BackendConfig, ScopeConfig, ServerInfo};
pub use config_db::ConfigDb;
pub use data_dir::CacheDir;
pub use department::Department;
pub use error::{Error, Result};
pub use row::{Row, TagPair};
pub use scope::Scope;
pub use tag_cache::TagCache;
