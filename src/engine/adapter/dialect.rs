//! SQL Dialect Generator
//!
//! Quotes identifiers and renders escaped literals for each supported dialect.
//! Statements are sent as plain text; no parameter placeholders are used.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Sqlite,
    Mysql,
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::Sqlite => write!(f, "sqlite"),
            SqlDialect::Mysql => write!(f, "mysql"),
        }
    }
}

impl SqlDialect {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(SqlDialect::Sqlite),
            "mysql" | "mariadb" => Some(SqlDialect::Mysql),
            _ => None,
        }
    }
}

/// SQL dialect-aware text generator
pub struct DialectGenerator {
    pub dialect: SqlDialect,
}

impl DialectGenerator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Quote an identifier (table or column name)
    pub fn quote_ident(&self, name: &str) -> String {
        match self.dialect {
            SqlDialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
            SqlDialect::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// Render a value as an escaped SQL literal
    pub fn escape_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self.dialect {
                SqlDialect::Sqlite => (if *b { "1" } else { "0" }).to_string(),
                SqlDialect::Mysql => b.to_string(),
            },
            Value::Number(n) => n.to_string(),
            Value::String(s) => self.escape_string(s),
            Value::Array(_) | Value::Object(_) => self.escape_string(&value.to_string()),
        }
    }

    fn escape_string(&self, s: &str) -> String {
        match self.dialect {
            SqlDialect::Sqlite => format!("'{}'", s.replace('\'', "''")),
            SqlDialect::Mysql => {
                let mut escaped = String::with_capacity(s.len() + 2);
                escaped.push('\'');
                for c in s.chars() {
                    match c {
                        '\0' => escaped.push_str("\\0"),
                        '\u{8}' => escaped.push_str("\\b"),
                        '\t' => escaped.push_str("\\t"),
                        '\n' => escaped.push_str("\\n"),
                        '\r' => escaped.push_str("\\r"),
                        '\u{1a}' => escaped.push_str("\\Z"),
                        '"' => escaped.push_str("\\\""),
                        '\'' => escaped.push_str("\\'"),
                        '\\' => escaped.push_str("\\\\"),
                        _ => escaped.push(c),
                    }
                }
                escaped.push('\'');
                escaped
            }
        }
    }

    /// Equality comparison against a literal
    pub fn equals(&self, column: &str, value: &Value) -> String {
        match value {
            Value::Null => format!("{} IS NULL", self.quote_ident(column)),
            _ => format!("{} = {}", self.quote_ident(column), self.escape_literal(value)),
        }
    }

    /// Catalog query listing the tables of a database, one `table_name` per row
    pub fn list_tables(&self, database: &str) -> String {
        match self.dialect {
            SqlDialect::Sqlite => {
                "SELECT name AS table_name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name".to_string()
            }
            SqlDialect::Mysql => format!(
                "SELECT table_name AS table_name FROM information_schema.tables WHERE table_schema = {}",
                self.escape_literal(&Value::String(database.to_string()))
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_ident() {
        assert_eq!(DialectGenerator::new(SqlDialect::Mysql).quote_ident("users"), "`users`");
        assert_eq!(DialectGenerator::new(SqlDialect::Sqlite).quote_ident("users"), "\"users\"");
    }

    #[test]
    fn test_mysql_escaping() {
        let gen = DialectGenerator::new(SqlDialect::Mysql);
        assert_eq!(gen.escape_literal(&json!("O'Brien")), r"'O\'Brien'");
        assert_eq!(gen.escape_literal(&json!("a\nb\\")), r"'a\nb\\'");
        assert_eq!(gen.escape_literal(&json!(42)), "42");
        assert_eq!(gen.escape_literal(&json!(true)), "true");
        assert_eq!(gen.escape_literal(&Value::Null), "NULL");
    }

    #[test]
    fn test_sqlite_escaping() {
        let gen = DialectGenerator::new(SqlDialect::Sqlite);
        assert_eq!(gen.escape_literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(gen.escape_literal(&json!(false)), "0");
        assert_eq!(gen.escape_literal(&json!(["x"])), r#"'["x"]'"#);
    }

    #[test]
    fn test_equals_null() {
        let gen = DialectGenerator::new(SqlDialect::Mysql);
        assert_eq!(gen.equals("deleted", &Value::Null), "`deleted` IS NULL");
        assert_eq!(gen.equals("id", &json!(3)), "`id` = 3");
    }

    #[test]
    fn test_list_tables_query() {
        let gen = DialectGenerator::new(SqlDialect::Mysql);
        assert_eq!(
            gen.list_tables("shop"),
            "SELECT table_name AS table_name FROM information_schema.tables WHERE table_schema = 'shop'"
        );
    }
}
