//! Query state shared by every engine adapter

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::error::StoreError;

/// A stored row or document, keyed `id` for identity once persisted
pub type Record = serde_json::Map<String, Value>;

/// Uniform identity field name seen by callers
pub const IDENTITY_FIELD: &str = "id";

/// Comparison operators usable in filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Exact match
    Equal,
    /// Pattern match; a regular expression on the embedded engine
    Like,
}

impl Condition {
    /// Numeric code used by serialized filters
    pub fn code(&self) -> u8 {
        match self {
            Condition::Equal => 1,
            Condition::Like => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Condition::Equal),
            2 => Some(Condition::Like),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equal => write!(f, "="),
            Condition::Like => write!(f, "LIKE"),
        }
    }
}

/// One field constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub condition: Condition,
    pub value: Value,
}

impl FilterClause {
    pub fn eq(value: impl Into<Value>) -> Self {
        Self {
            condition: Condition::Equal,
            value: value.into(),
        }
    }

    pub fn like(value: impl Into<Value>) -> Self {
        Self {
            condition: Condition::Like,
            value: value.into(),
        }
    }
}

impl From<Value> for FilterClause {
    fn from(value: Value) -> Self {
        FilterClause::eq(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(StoreError::UnsupportedOperation(format!(
                "sort direction {:?}",
                other
            ))),
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), direction: SortDirection::Asc }
    }

    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), direction: SortDirection::Desc }
    }
}

/// Limit/offset window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Page {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

/// Rows handed to an insert: one record or a sequence
#[derive(Debug, Clone, Default)]
pub struct Rows(pub Vec<Record>);

impl From<Record> for Rows {
    fn from(row: Record) -> Self {
        Rows(vec![row])
    }
}

impl From<Vec<Record>> for Rows {
    fn from(rows: Vec<Record>) -> Self {
        Rows(rows)
    }
}

/// The query in progress, consumed by exactly one terminal operation
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub table: Option<String>,
    pub projection: String,
    /// Insertion-ordered; a second clause on the same field replaces the first
    pub filters: Vec<(String, FilterClause)>,
    pub sort: Option<SortSpec>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            table: None,
            projection: "*".to_string(),
            filters: Vec::new(),
            sort: None,
            limit: None,
            offset: None,
        }
    }
}

impl QueryState {
    pub fn table(&self) -> Result<&str, StoreError> {
        self.table.as_deref().ok_or(StoreError::MissingTable)
    }

    pub fn add_filter(&mut self, field: &str, clause: FilterClause) {
        match self.filters.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = clause,
            None => self.filters.push((field.to_string(), clause)),
        }
    }

    /// Limit coerced to at least one, if set
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit.map(|limit| limit.max(1))
    }

    /// Offset applies only when a limit is set and the offset is positive
    pub fn effective_offset(&self) -> Option<u64> {
        self.effective_limit()?;
        self.offset.filter(|offset| *offset > 0)
    }
}

/// Move the native identity field to `id`
pub fn normalize_identity(mut record: Record, native: &str) -> Record {
    if native == IDENTITY_FIELD {
        return record;
    }
    if let Some(id) = record.remove(native) {
        record.insert(IDENTITY_FIELD.to_string(), id);
    }
    record
}

/// Drop caller-supplied identity fields before a write
pub fn strip_identity(record: &mut Record, native: &str) {
    record.remove(IDENTITY_FIELD);
    record.remove(native);
}
