use std::{collections::BTreeMap, path::Path, sync::RwLock};

use crate::{
    error::{Error, Result},
    record_dir::RecordDir,
    row::TagPair,
};

/// Last-known tag pairs, mirrored in memory and persisted one file per
/// pair.
///
/// The cache is an optimization: anything in it can be fetched again from
/// the backend. A single reader/writer lock covers both the mirror and the
/// directory, so a background refresh writing pairs never interleaves with
/// a foreground read.
pub struct TagCache {
    inner: RwLock<Inner>,
}

struct Inner {
    dir: RecordDir<TagPair>,
    /// Keyed by `TagPair::random`.
    pairs: BTreeMap<String, TagPair>,
}

impl TagCache {
    /// Open the cache rooted at `dir` and load whatever is already there.
    pub fn open(dir: &Path) -> Result<Self> {
        let dir = RecordDir::open(dir)?;
        let pairs = dir
            .load_all()?
            .into_iter()
            .map(|p: TagPair| (p.random.clone(), p))
            .collect();
        Ok(Self {
            inner: RwLock::new(Inner { dir, pairs }),
        })
    }

    /// Persist one pair. Saving a pair that is already cached is a no-op.
    pub fn save(&self, pair: &TagPair) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::LockPoisoned("tag cache"))?;

        if inner.pairs.get(&pair.random) == Some(pair) {
            return Ok(());
        }

        inner.dir.put(&pair.random, pair)?;
        inner.pairs.insert(pair.random.clone(), pair.clone());
        Ok(())
    }

    /// Rebuild the pair list from disk. Each stored pair appears once,
    /// ordered by its random tag.
    pub fn load_all(&self) -> Result<Vec<TagPair>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::LockPoisoned("tag cache"))?;
        let mut pairs = inner.dir.load_all()?;
        pairs.sort();
        pairs.dedup_by(|a, b| a.random == b.random);
        Ok(pairs)
    }

    /// Snapshot of the in-memory mirror.
    pub fn pairs(&self) -> Result<Vec<TagPair>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::LockPoisoned("tag cache"))?;
        Ok(inner.pairs.values().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::LockPoisoned("tag cache"))?;
        Ok(inner.pairs.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn plain_for_random(&self, random: &str) -> Result<Option<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::LockPoisoned("tag cache"))?;
        Ok(inner.pairs.get(random).map(|p| p.plain.clone()))
    }

    pub fn random_for_plain(&self, plain: &str) -> Result<Option<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::LockPoisoned("tag cache"))?;
        Ok(inner
            .pairs
            .values()
            .find(|p| p.plain == plain)
            .map(|p| p.random.clone()))
    }
}

impl std::fmt::Debug for TagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCache").finish_non_exhaustive()
    }
}
