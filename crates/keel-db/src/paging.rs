//! Cursor pagination input. Grounded on
//! `original_source/runtime/actions/query.go`'s `Page`/`ApplyPaging`, per
//! `spec.md` §4.F and §6 (relay-style `after`/`before`/`first`/`last`).

/// `id` is used as the cursor column throughout - `spec.md` §3 requires
/// every model to carry a monotonically-ordered `id`, so no separate
/// cursor-encoding scheme is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub after: Option<String>,
    pub before: Option<String>,
    /// `0` means "no limit" when paired with a cursor and unset otherwise -
    /// `spec.md` §9 Open Question, decided in `DESIGN.md`.
    pub first: i64,
    pub last: i64,
}

impl Page {
    pub fn forward(first: i64, after: Option<String>) -> Self {
        Self { first, after, ..Default::default() }
    }

    pub fn backward(last: i64, before: Option<String>) -> Self {
        Self { last, before, ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_page_carries_after_cursor() {
        let page = Page::forward(10, Some("k1".to_string()));
        assert_eq!(page.first, 10);
        assert_eq!(page.after, Some("k1".to_string()));
        assert_eq!(page.last, 0);
    }
}
