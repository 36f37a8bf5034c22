use serde::{Deserialize, Serialize};

/// Tag prefixes that carry schema rather than user-facing meaning.
pub const TYPE_PREFIX: &str = "type:";
pub const ID_PREFIX: &str = "id:";

/// One stored item as handed over by a backend.
///
/// `data` holds the decrypted payload when the row came through the
/// content path and is empty when only metadata was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRow")]
pub struct Row {
    data: Vec<u8>,
    plain_tags: Vec<String>,
}

/// On-disk shape of a row, before tags are deduplicated.
#[derive(Deserialize)]
struct RawRow {
    #[serde(default)]
    data: Vec<u8>,
    #[serde(default)]
    plain_tags: Vec<String>,
}

impl From<RawRow> for Row {
    fn from(raw: RawRow) -> Self {
        Row::new(raw.data, raw.plain_tags)
    }
}

impl Row {
    /// Build a row, dropping repeated tags while keeping first-seen order.
    ///
    /// # Examples
    ///
    /// ```
    /// use cryptag_scope::Row;
    ///
    /// let row = Row::new(b"hi".to_vec(), ["type:text", "type:note", "type:text"]);
    /// assert_eq!(row.plain_tags(), ["type:text", "type:note"]);
    /// assert_eq!(row.decrypted(), b"hi");
    /// ```
    pub fn new<I, S>(data: Vec<u8>, plain_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags: Vec<String> = Vec::new();
        for tag in plain_tags {
            let tag = tag.into();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Self {
            data,
            plain_tags: tags,
        }
    }

    pub fn decrypted(&self) -> &[u8] {
        &self.data
    }

    pub fn plain_tags(&self) -> &[String] {
        &self.plain_tags
    }

    pub fn has_plain_tag(&self, tag: &str) -> bool {
        self.plain_tags.iter().any(|t| t == tag)
    }

    /// Value of the first tag carrying one of `prefixes`, trying the
    /// prefixes in order. The prefix itself is stripped.
    pub fn tag_with_prefix(&self, prefixes: &[&str]) -> Option<&str> {
        prefixes.iter().find_map(|prefix| {
            self.plain_tags
                .iter()
                .find_map(|tag| tag.strip_prefix(prefix))
        })
    }

    /// The row's `id:` value, if it has one.
    pub fn id(&self) -> Option<&str> {
        self.tag_with_prefix(&[ID_PREFIX])
    }

    /// Copy of this row with the payload dropped, as returned by metadata
    /// listings.
    pub fn without_content(&self) -> Self {
        Self {
            data: Vec::new(),
            plain_tags: self.plain_tags.clone(),
        }
    }

    /// True when every tag in `tags` is present on this row.
    pub fn matches_all(&self, tags: &[String]) -> bool {
        tags.iter().all(|tag| self.has_plain_tag(tag))
    }
}

/// Mapping between a backend's opaque tag identifier and its plaintext.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TagPair {
    pub random: String,
    pub plain: String,
}

impl TagPair {
    pub fn new(random: impl Into<String>, plain: impl Into<String>) -> Self {
        Self {
            random: random.into(),
            plain: plain.into(),
        }
    }
}
