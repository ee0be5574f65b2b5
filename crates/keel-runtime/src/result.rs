//! The shapes `Dispatcher::invoke` returns, and the `hasNext`/`totalCount`
//! extraction `spec.md` §4.F's `ApplyPaging` bakes into the `SELECT` list -
//! grounded on `original_source/runtime/actions/query.go`'s
//! `ExecuteToMany`/`PageInfo`.

use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub count: usize,
    pub total_count: i64,
    pub has_next_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "hasNextPage": self.has_next_page,
            "totalCount": self.total_count,
            "startCursor": self.start_cursor,
            "endCursor": self.end_cursor,
        })
    }
}

/// Strips the `hasnext`/`totalcount` columns `ApplyPaging` adds to every
/// row, reading them off the last row (Postgres emits the same computed
/// values per row) to build the `PageInfo` the `list` action returns
/// alongside the now-clean result rows. The unquoted `AS hasNext`/`AS
/// totalCount` aliases `QueryBuilder::apply_paging` emits get folded to
/// lowercase by Postgres before `row_to_camel_json` ever sees them (it has
/// no underscore to re-capitalize), matching `original_source`'s
/// `last["hasnext"]`/`last["totalcount"]` lookups.
pub fn extract_page_info(rows: &mut [JsonMap<String, JsonValue>]) -> PageInfo {
    let count = rows.len();
    let has_next_page = rows.last().and_then(|r| r.get("hasnext")).and_then(JsonValue::as_bool).unwrap_or(false);
    let total_count = rows.last().and_then(|r| r.get("totalcount")).and_then(JsonValue::as_i64).unwrap_or(count as i64);

    for row in rows.iter_mut() {
        row.remove("hasnext");
        row.remove("totalcount");
    }

    let start_cursor = rows.first().and_then(|r| r.get("id")).and_then(JsonValue::as_str).map(str::to_string);
    let end_cursor = rows.last().and_then(|r| r.get("id")).and_then(JsonValue::as_str).map(str::to_string);

    PageInfo { count, total_count, has_next_page, start_cursor, end_cursor }
}

/// What `Dispatcher::invoke` hands back to the caller - `spec.md` §4.G's
/// per-action-type result shapes.
#[derive(Debug, Clone)]
pub enum ActionResult {
    Row(JsonMap<String, JsonValue>),
    List { results: Vec<JsonMap<String, JsonValue>>, page_info: PageInfo },
    Deleted { id: String },
    Custom(Option<JsonValue>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_page_info_and_strips_paging_columns_from_every_row() {
        let mut rows = vec![
            JsonMap::from_iter([("id".to_string(), json!("k1")), ("hasnext".to_string(), json!(false)), ("totalcount".to_string(), json!(2))]),
            JsonMap::from_iter([("id".to_string(), json!("k2")), ("hasnext".to_string(), json!(true)), ("totalcount".to_string(), json!(2))]),
        ];
        let page_info = extract_page_info(&mut rows);
        assert_eq!(page_info.count, 2);
        assert_eq!(page_info.total_count, 2);
        assert!(page_info.has_next_page);
        assert_eq!(page_info.start_cursor.as_deref(), Some("k1"));
        assert_eq!(page_info.end_cursor.as_deref(), Some("k2"));
        assert!(!rows[0].contains_key("hasnext"));
        assert!(!rows[0].contains_key("totalcount"));
    }

    #[test]
    fn empty_result_set_has_no_cursors() {
        let mut rows: Vec<JsonMap<String, JsonValue>> = Vec::new();
        let page_info = extract_page_info(&mut rows);
        assert_eq!(page_info.count, 0);
        assert!(!page_info.has_next_page);
        assert!(page_info.start_cursor.is_none());
    }
}
