use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    backend::Backend,
    error::{Error, Result},
    record_dir::RecordDir,
    row::{ID_PREFIX, Row, TagPair},
};

/// Tag every stored row carries.
pub const ALL_TAG: &str = "all";

/// Backend over a local data directory laid out as `rows/` and `tags/`,
/// one JSON record per row or tag pair.
///
/// Payloads are stored as handed in; encrypting them is the job of the
/// sync layer this directory mirrors.
pub struct LocalBackend {
    name: String,
    root: PathBuf,
    rows: RecordDir<Row>,
    tags: RecordDir<TagPair>,
    write_lock: Mutex<()>,
}

impl LocalBackend {
    pub fn open(name: &str, root: &Path) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            root: root.to_path_buf(),
            rows: RecordDir::open(&root.join("rows"))?,
            tags: RecordDir::open(&root.join("tags"))?,
            write_lock: Mutex::new(()),
        })
    }

    /// Store a new row. `all` and a fresh `id:` tag are added unless
    /// present, and every plain tag gets a tag pair.
    pub fn add_row<I, S>(&self, data: Vec<u8>, plain_tags: I) -> Result<Row>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::LockPoisoned("local backend"))?;

        let mut tags: Vec<String> =
            plain_tags.into_iter().map(Into::into).collect();
        if !tags.iter().any(|t| t.starts_with(ID_PREFIX)) {
            tags.push(format!("{ID_PREFIX}{}", random_hex()));
        }
        if !tags.iter().any(|t| t == ALL_TAG) {
            tags.push(ALL_TAG.to_string());
        }
        let row = Row::new(data, tags);

        let known: HashSet<String> =
            self.tags.load_all()?.into_iter().map(|p| p.plain).collect();
        for plain in row.plain_tags() {
            if !known.contains(plain) {
                let pair = TagPair::new(random_hex(), plain.clone());
                self.tags.put(&pair.random, &pair)?;
            }
        }

        let id = row.id().map(str::to_string).ok_or_else(|| {
            Error::Config("row was stored without an id tag".into())
        })?;
        self.rows.put(&id, &row)?;

        tracing::debug!(id = %id, tags = ?row.plain_tags(), "stored row");
        Ok(row)
    }

    /// The row whose `id:` tag is `id`.
    pub fn get_row(&self, id: &str) -> Result<Option<Row>> {
        self.rows.get(id)
    }

    fn matching_rows(&self, plain_tags: &[String]) -> Result<Vec<Row>> {
        Ok(self
            .rows
            .load_all()?
            .into_iter()
            .filter(|row| row.matches_all(plain_tags))
            .collect())
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn all_tag_pairs(&self) -> Result<Vec<TagPair>> {
        self.tags.load_all()
    }

    fn rows_from_plain_tags(&self, plain_tags: &[String]) -> Result<Vec<Row>> {
        self.matching_rows(plain_tags)
    }

    fn list_rows(&self, plain_tags: &[String]) -> Result<Vec<Row>> {
        Ok(self
            .matching_rows(plain_tags)?
            .iter()
            .map(Row::without_content)
            .collect())
    }

    fn save_tag_pair(&self, pair: &TagPair) -> Result<()> {
        if self.tags.get(&pair.random)?.as_ref() == Some(pair) {
            return Ok(());
        }
        self.tags.put(&pair.random, pair)
    }
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("name", &self.name)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

fn random_hex() -> String {
    format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}
