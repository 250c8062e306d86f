//! Pagination types
//!
//! A page is one response's worth of records plus the server's pagination
//! signals. The continuation cursor is authoritative: a page that carries a
//! cursor always leads to another fetch, whatever its `done` flag says.

use crate::error::{Error, Result};
use crate::types::{OptionStringExt, Record};
use serde::Deserialize;
use serde_json::Value;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available behind this cursor
    Continue {
        /// Opaque server-issued cursor (usually a relative URL)
        cursor: String,
    },
    /// No more pages
    Done,
}

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in API order
    pub records: Vec<Record>,
    /// Cursor for the next page, if more records exist
    pub next_cursor: Option<String>,
    /// Server's "no more records" marker
    pub done: bool,
    /// Total number of records matching the query, when reported
    pub total_size: Option<u64>,
}

/// Raw query response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    records: Option<Vec<Value>>,
    #[serde(default)]
    next_records_url: Option<String>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    total_size: Option<u64>,
}

impl Page {
    /// Create a page from records and a cursor
    pub fn new(records: Vec<Record>, next_cursor: Option<String>) -> Self {
        let done = next_cursor.is_none();
        Self {
            records,
            next_cursor,
            done,
            total_size: None,
        }
    }

    /// Parse a query response body
    ///
    /// Missing `records` means an empty page. An empty cursor string counts
    /// as no cursor. A missing `done` flag is inferred from the cursor.
    pub fn from_body(body: Value) -> Result<Self> {
        if !body.is_object() {
            return Err(Error::decode(format!(
                "query response is not a JSON object: {body}"
            )));
        }
        let response: QueryResponse = serde_json::from_value(body)
            .map_err(|e| Error::decode(format!("unexpected query response shape: {e}")))?;

        let next_cursor = response.next_records_url.none_if_empty();
        let done = response.done.unwrap_or(next_cursor.is_none());

        Ok(Self {
            records: response.records.unwrap_or_default(),
            next_cursor,
            done,
            total_size: response.total_size,
        })
    }

    /// Whether another fetch is needed
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    /// Where pagination goes after this page
    pub fn next_page(&self) -> NextPage {
        match &self.next_cursor {
            Some(cursor) => NextPage::Continue {
                cursor: cursor.clone(),
            },
            None => NextPage::Done,
        }
    }

    /// Number of records on this page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this page has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A page without cursor that does not claim to be done
    pub fn is_inconsistent(&self) -> bool {
        self.next_cursor.is_none() && !self.done
    }
}
