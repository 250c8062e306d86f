//! Audit trail query construction
//!
//! Builds the select query sent to the remote API. The record schema is
//! fixed; only the relative time window varies between runs.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Object queried for audit entries
pub const AUDIT_OBJECT: &str = "SetupAuditTrail";

/// Fields selected for every audit entry
pub const AUDIT_FIELDS: &[&str] = &[
    "Action",
    "CreatedById",
    "CreatedDate",
    "Display",
    "Id",
    "ResponsibleNamespacePrefix",
    "Section",
    "CreatedBy.name",
];

/// `1d`, `7 days`, `last 7 days`, `>7d`
static WINDOW_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<since>last\s+|>\s*)?(?P<days>\d+)\s*(?:d|day|days)\s*$").unwrap()
});

/// Relative time filter on the creation date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryWindow {
    /// Entries created on the day exactly N days ago
    DaysAgo(u32),
    /// Entries created after the day N days ago
    Since(u32),
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self::DaysAgo(1)
    }
}

impl QueryWindow {
    /// Number of days the window refers to
    pub fn days(&self) -> u32 {
        match self {
            Self::DaysAgo(days) | Self::Since(days) => *days,
        }
    }

    /// Render as a `WHERE` predicate
    pub fn to_predicate(&self) -> String {
        match self {
            Self::DaysAgo(days) => format!("CreatedDate = N_DAYS_AGO:{days}"),
            Self::Since(days) => format!("CreatedDate > N_DAYS_AGO:{days}"),
        }
    }
}

impl FromStr for QueryWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = WINDOW_REGEX.captures(s).ok_or_else(|| {
            Error::invalid_value(
                "query_window",
                format!("'{s}' (expected e.g. '1d', '7 days' or 'last 7 days')"),
            )
        })?;

        let days: u32 = caps["days"]
            .parse()
            .map_err(|e| Error::invalid_value("query_window", format!("'{s}': {e}")))?;
        if days == 0 {
            return Err(Error::invalid_value(
                "query_window",
                "window must cover at least one day",
            ));
        }

        if caps.name("since").is_some() {
            Ok(Self::Since(days))
        } else {
            Ok(Self::DaysAgo(days))
        }
    }
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DaysAgo(days) => write!(f, "{days}d"),
            Self::Since(days) => write!(f, "last {days} days"),
        }
    }
}

impl Serialize for QueryWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QueryWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The select query for one export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    window: QueryWindow,
}

impl AuditQuery {
    /// Query audit entries inside the given window
    pub fn new(window: QueryWindow) -> Self {
        Self { window }
    }

    /// The time window
    pub fn window(&self) -> QueryWindow {
        self.window
    }

    /// Render the query string sent as the `q` parameter
    pub fn to_soql(&self) -> String {
        format!(
            "select {} FROM {AUDIT_OBJECT} WHERE {}",
            AUDIT_FIELDS.join(","),
            self.window.to_predicate()
        )
    }
}

impl fmt::Display for AuditQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_soql())
    }
}
