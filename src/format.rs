//! Row to display-string mapping.
//!
//! Everything here is a pure function of its arguments, so it can run on
//! any number of rows at once.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use crate::{
    department::Department,
    reply::ResultRecord,
    row::{Row, TYPE_PREFIX},
};

/// Result URI prefix that re-queries this scope.
pub const SCOPE_URI: &str = "scope://cryptag-scope.elimisteve_cryptag-scope";

const ART_URL_PREFIX: &str =
    "https://placeholdit.imgix.net/~text?txtsize=100&txt=";
const ART_URL_SUFFIX: &str = "&w=300&h=300";

const TITLE_PREFIXES: &[&str] = &["filename:", "title:", "site:"];
const HIDDEN_PREFIXES: &[&str] = &["type:", "id:", "app:", "filename:"];
const GENERIC_TYPES: &[&str] = &["type:text", "type:file"];

pub const NO_TITLE: &str = "(No Title)";

fn is_passwords(department_id: &str) -> bool {
    department_id == Department::Passwords.id()
}

pub fn bold(text: &str) -> String {
    format!("<b>{text}</b>")
}

/// Tags worth showing a person, in their original order.
///
/// # Examples
///
/// ```
/// use cryptag_scope::format::human_readable_tags;
///
/// let tags = ["all", "type:text", "bank", "id:1", "work", "app:x"];
/// assert_eq!(human_readable_tags(&tags), ["bank", "work"]);
/// ```
pub fn human_readable_tags<S: AsRef<str>>(tags: &[S]) -> Vec<&str> {
    tags.iter()
        .map(|t| <S as AsRef<str>>::as_ref(t))
        .filter(|t| {
            *t != "all" && !HIDDEN_PREFIXES.iter().any(|p| t.starts_with(*p))
        })
        .collect()
}

pub fn row_title(row: &Row, department_id: &str) -> String {
    if let Some(title) = row.tag_with_prefix(TITLE_PREFIXES)
        && !title.is_empty()
    {
        return title.to_string();
    }
    if is_passwords(department_id) {
        return human_readable_tags(row.plain_tags()).join(", ");
    }
    NO_TITLE.to_string()
}

pub fn row_summary(row: &Row) -> String {
    bold("All Tags: ") + &row.plain_tags().join(", ")
}

/// Card subtitle. Empty for passwords so the list view does not show what
/// a secret is tagged with.
pub fn row_short_summary(row: &Row, department_id: &str) -> String {
    if is_passwords(department_id) {
        return String::new();
    }
    human_readable_tags(row.plain_tags()).join(", ")
}

pub fn row_art(row: &Row) -> String {
    let types: Vec<&str> = row
        .plain_tags()
        .iter()
        .filter(|t| !GENERIC_TYPES.contains(&t.as_str()))
        .filter_map(|t| t.strip_prefix(TYPE_PREFIX))
        .collect();
    format!("{ART_URL_PREFIX}{}{ART_URL_SUFFIX}", types.join(", "))
}

pub fn row_text_content(row: &Row, department_id: &str) -> String {
    if !row.has_plain_tag("type:text") {
        return String::new();
    }

    let text = String::from_utf8_lossy(row.decrypted());

    match Department::from_id(department_id) {
        Some(Department::Passwords) => text.into_owned(),
        Some(Department::Notes) => bold("Note: ") + &text,
        _ => bold("Content: ") + &text,
    }
}

/// Password results link back to this scope with the secret as the query,
/// so activating one lands it somewhere it can be copied.
pub fn row_uri(row: &Row, department_id: &str) -> String {
    if !is_passwords(department_id) {
        return String::new();
    }
    let text = String::from_utf8_lossy(row.decrypted());
    format!("{SCOPE_URI}?q={}", utf8_percent_encode(&text, NON_ALPHANUMERIC))
}

/// Build a fresh result record for `row`.
pub fn format_row(row: &Row, department_id: &str, category: &str) -> ResultRecord {
    let mut record = ResultRecord::new(category);
    record.set("uri", row_uri(row, department_id));
    record.set("title", row_title(row, department_id));
    record.set("art", row_art(row));
    record.set("summary", row_summary(row));
    record.set("short_summary", row_short_summary(row, department_id));
    record.set("text_content", row_text_content(row, department_id));
    if let Some(id) = row.id() {
        record.set("row_id", id);
    }
    record
}
