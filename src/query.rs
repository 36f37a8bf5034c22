use crate::department::{Department, ROOT_ID};

/// Which backend call a search goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Tags only. Cheap; used for generic listings.
    Metadata,
    /// Decryptable content, for departments where the user reads or copies
    /// what they find.
    Content,
}

impl FetchMode {
    pub fn for_department(department_id: &str) -> Self {
        match Department::from_id(department_id) {
            Some(Department::Notes | Department::Passwords) => Self::Content,
            _ => Self::Metadata,
        }
    }
}

/// Turn query text and a department id into the tags the backend ANDs
/// together.
///
/// The free-text tags come first, in the order typed, followed by the
/// department's fixed tags. Duplicates are kept.
///
/// # Examples
///
/// ```
/// use cryptag_scope::query::build_filter_tags;
///
/// assert_eq!(
///     build_filter_tags("bank  work", "Passwords"),
///     ["bank", "work", "type:text", "type:password"],
/// );
/// assert_eq!(build_filter_tags("bank", ""), ["bank"]);
/// ```
pub fn build_filter_tags(query_text: &str, department_id: &str) -> Vec<String> {
    let mut tags: Vec<String> =
        query_text.split_whitespace().map(str::to_string).collect();

    if department_id != ROOT_ID
        && let Some(dept) = Department::from_id(department_id)
    {
        tags.extend(dept.required_tags().iter().map(|t| t.to_string()));
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_uses_only_free_text() {
        assert_eq!(build_filter_tags("a b\tc\n", ROOT_ID), ["a", "b", "c"]);
    }

    #[test]
    fn department_tags_follow_free_text() {
        for dept in Department::SUBDEPARTMENTS {
            let tags = build_filter_tags("x y", dept.id());
            assert_eq!(&tags[..2], ["x", "y"]);
            assert_eq!(&tags[2..], dept.required_tags());
        }
    }

    #[test]
    fn empty_text_with_department() {
        assert_eq!(build_filter_tags("", "Files"), ["type:file"]);
        assert_eq!(build_filter_tags("   ", "Notes"), ["type:text", "type:note"]);
    }

    #[test]
    fn unknown_department_adds_nothing() {
        assert_eq!(build_filter_tags("q", "Music"), ["q"]);
    }

    #[test]
    fn duplicates_are_kept() {
        assert_eq!(
            build_filter_tags("type:file", "Files"),
            ["type:file", "type:file"]
        );
    }

    #[test]
    fn fetch_mode_by_department() {
        assert_eq!(FetchMode::for_department("Notes"), FetchMode::Content);
        assert_eq!(FetchMode::for_department("Passwords"), FetchMode::Content);
        assert_eq!(FetchMode::for_department("Files"), FetchMode::Metadata);
        assert_eq!(FetchMode::for_department(ROOT_ID), FetchMode::Metadata);
        assert_eq!(FetchMode::for_department("Music"), FetchMode::Metadata);
    }
}
