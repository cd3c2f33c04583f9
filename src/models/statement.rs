//! Statement-related data models.
//!
//! This module defines the request body accepted by both execution endpoints, the
//! validated request handed to the executor, and the outcome it produces.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A fetched row, keyed by column name in select-list order.
pub type Row = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arrays and objects, bound as JSON
    Json(JsonValue),
}

impl QueryParam {
    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

/// Body of `POST /query` and `POST /execute`.
///
/// Both fields are optional on the wire so that a missing `sql` is reported as a
/// validation failure rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementBody {
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub params: Option<Vec<QueryParam>>,
}

impl StatementBody {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Vec<QueryParam>) -> Self {
        self.params = Some(params);
        self
    }
}

/// A validated statement: non-blank SQL plus its bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRequest {
    sql: String,
    params: Vec<QueryParam>,
}

impl StatementRequest {
    /// Build a request, returning `None` when the SQL is missing or blank.
    ///
    /// The SQL text is kept exactly as sent; trimming only decides emptiness.
    pub fn from_body(body: StatementBody) -> Option<Self> {
        let sql = body.sql.filter(|s| !s.trim().is_empty())?;
        Some(Self {
            sql,
            params: body.params.unwrap_or_default(),
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// First characters of the statement, for log lines.
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.sql.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.sql[..idx],
            None => &self.sql,
        }
    }
}

/// The two execution entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    /// `POST /query`: SELECT only.
    Read,
    /// `POST /execute`: DML and DDL.
    Write,
}

impl EntryPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "query",
            Self::Write => "execute",
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent of a statement, as seen from one entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerbCategory {
    /// SELECT
    Read,
    /// INSERT, UPDATE, DELETE, EXECUTE
    Write,
    /// CREATE, DROP, ALTER
    Ddl,
    /// Not allowed on the entry point it was submitted to
    Rejected,
}

impl VerbCategory {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Whether a successful statement must be followed by an explicit commit.
    pub fn requires_commit(&self) -> bool {
        matches!(self, Self::Write)
    }
}

/// Successful result of running one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Rows { rows: Vec<Row>, row_count: usize },
    Affected { rows_affected: u64 },
    Acknowledged,
}

impl ExecutionOutcome {
    pub fn rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len();
        Self::Rows { rows, row_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_types() {
        assert_eq!(QueryParam::Null.type_name(), "null");
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(
            QueryParam::String("hello".to_string()).type_name(),
            "string"
        );
    }

    #[test]
    fn test_params_decode_from_json() {
        let params: Vec<QueryParam> =
            serde_json::from_str(r#"[null, true, 7, 1.5, "abc", [1, 2], {"k": "v"}]"#).unwrap();
        assert_eq!(
            params,
            vec![
                QueryParam::Null,
                QueryParam::Bool(true),
                QueryParam::Int(7),
                QueryParam::Float(1.5),
                QueryParam::String("abc".to_string()),
                QueryParam::Json(serde_json::json!([1, 2])),
                QueryParam::Json(serde_json::json!({"k": "v"})),
            ]
        );
    }

    #[test]
    fn test_body_without_params() {
        let body: StatementBody = serde_json::from_str(r#"{"sql": "SELECT 1"}"#).unwrap();
        let request = StatementRequest::from_body(body).unwrap();
        assert_eq!(request.sql(), "SELECT 1");
        assert!(request.params().is_empty());
    }

    #[test]
    fn test_null_params_are_empty() {
        let body: StatementBody =
            serde_json::from_str(r#"{"sql": "SELECT 1", "params": null}"#).unwrap();
        assert!(StatementRequest::from_body(body).unwrap().params().is_empty());
    }

    #[test]
    fn test_missing_or_blank_sql_is_invalid() {
        assert!(StatementRequest::from_body(StatementBody::default()).is_none());
        assert!(StatementRequest::from_body(StatementBody::new("")).is_none());
        assert!(StatementRequest::from_body(StatementBody::new(" \n\t ")).is_none());
    }

    #[test]
    fn test_sql_is_not_rewritten() {
        let request = StatementRequest::from_body(StatementBody::new("  select 1  ")).unwrap();
        assert_eq!(request.sql(), "  select 1  ");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let request = StatementRequest::from_body(StatementBody::new("SELECT 'äöü'")).unwrap();
        assert_eq!(request.preview(9), "SELECT 'ä");
        assert_eq!(request.preview(100), "SELECT 'äöü'");
    }

    #[test]
    fn test_rows_outcome_counts_rows() {
        let mut row = Row::new();
        row.insert("ID".to_string(), serde_json::json!(1));
        let outcome = ExecutionOutcome::rows(vec![row.clone(), row]);
        match outcome {
            ExecutionOutcome::Rows { rows, row_count } => assert_eq!(row_count, rows.len()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_only_write_requires_commit() {
        assert!(VerbCategory::Write.requires_commit());
        assert!(!VerbCategory::Ddl.requires_commit());
        assert!(!VerbCategory::Read.requires_commit());
        assert!(VerbCategory::Rejected.is_rejected());
    }
}
