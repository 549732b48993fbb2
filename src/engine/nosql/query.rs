//! Query engine for embedded documents

use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::error::{NoSqlError, Result};

type Document = Map<String, Value>;

/// Filter operators
#[derive(Debug, Clone)]
pub enum FilterOp {
    /// Equality
    Eq(Value),
    /// Regular expression over a string field
    Regex(Regex),
}

/// A single filter condition
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self { field: field.to_string(), op: FilterOp::Eq(value.into()) }
    }

    pub fn regex(field: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| NoSqlError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { field: field.to_string(), op: FilterOp::Regex(regex) })
    }

    /// Check if a document matches this filter
    pub fn matches(&self, doc: &Document) -> bool {
        match (&self.op, doc.get(&self.field)) {
            (FilterOp::Eq(Value::Null), None) => true,
            (_, None) => false,
            (FilterOp::Eq(expected), Some(actual)) => actual == expected,
            (FilterOp::Regex(regex), Some(Value::String(s))) => regex.is_match(s),
            (FilterOp::Regex(_), Some(_)) => false,
        }
    }
}

/// All filters must match (AND)
pub fn matches_all(filters: &[Filter], doc: &Document) -> bool {
    filters.iter().all(|f| f.matches(doc))
}

/// Compare two JSON values; mixed types order null < number < string < bool
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Bool(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Cursor over a collection: filter, sort, skip, limit, projection
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    pub filters: Vec<Filter>,
    /// Sort key and whether it is descending
    pub sort: Option<(String, bool)>,
    pub skip: usize,
    pub limit: Option<usize>,
    /// Fields to keep besides the identity; None keeps all
    pub projection: Option<Vec<String>>,
}

impl Cursor {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters, ..Self::default() }
    }

    pub fn sort(mut self, field: &str, desc: bool) -> Self {
        self.sort = Some((field.to_string(), desc));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn project(mut self, fields: Vec<String>) -> Self {
        self.projection = Some(fields);
        self
    }

    /// Run over documents, returning owned copies
    pub fn execute<'a>(&self, docs: impl Iterator<Item = &'a Document>, id_field: &str) -> Vec<Document> {
        let mut results: Vec<&Document> = docs.filter(|doc| matches_all(&self.filters, doc)).collect();

        if let Some((ref field, desc)) = self.sort {
            results.sort_by(|a, b| {
                let ordering = match (a.get(field), b.get(field)) {
                    (Some(a), Some(b)) => compare_values(a, b),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                if desc { ordering.reverse() } else { ordering }
            });
        }

        let window = results.into_iter().skip(self.skip);
        let window: Vec<&Document> = match self.limit {
            Some(n) => window.take(n).collect(),
            None => window.collect(),
        };

        window
            .into_iter()
            .map(|doc| match &self.projection {
                Some(fields) => doc
                    .iter()
                    .filter(|(k, _)| k.as_str() == id_field || fields.iter().any(|f| f == *k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                None => doc.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    fn people() -> Vec<Document> {
        vec![
            doc(json!({"_id": "1", "name": "Alice", "age": 30})),
            doc(json!({"_id": "2", "name": "Bob", "age": 25})),
            doc(json!({"_id": "3", "name": "Charlie", "age": 35})),
        ]
    }

    #[test]
    fn test_filter_eq() {
        let d = doc(json!({"name": "Alice", "age": 30}));

        assert!(Filter::eq("name", "Alice").matches(&d));
        assert!(!Filter::eq("name", "Bob").matches(&d));
        assert!(Filter::eq("age", 30).matches(&d));
        assert!(!Filter::eq("missing", 1).matches(&d));
    }

    #[test]
    fn test_filter_regex() {
        let d = doc(json!({"name": "Alice", "age": 30}));

        assert!(Filter::regex("name", "^Al").unwrap().matches(&d));
        assert!(!Filter::regex("name", "ob$").unwrap().matches(&d));
        assert!(!Filter::regex("age", "3").unwrap().matches(&d));
        assert!(Filter::regex("name", "(").is_err());
    }

    #[test]
    fn test_cursor_sort_skip_limit() {
        let docs = people();
        let results = Cursor::new(vec![]).sort("age", true).skip(1).limit(1).execute(docs.iter(), "_id");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("name"), Some(&json!("Alice")));
    }

    #[test]
    fn test_cursor_projection() {
        let docs = people();
        let results = Cursor::new(vec![Filter::eq("name", "Bob")])
            .project(vec!["age".to_string()])
            .execute(docs.iter(), "_id");

        assert_eq!(results, vec![doc(json!({"_id": "2", "age": 25}))]);
    }

    #[test]
    fn test_compare_mixed() {
        assert_eq!(compare_values(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
    }
}
