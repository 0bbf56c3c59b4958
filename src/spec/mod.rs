// Query specification
// A QuerySpec is the resolved, immutable form of everything a caller said
// about one SELECT: filter, grouping, having, ordering, row window and locking

pub mod builder;

use crate::storage::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub use builder::QuerySpecBuilder;

/// Largest row count MySQL accepts; rendered as the limit when only an
/// offset was given
pub const UNBOUNDED_LIMIT: u64 = u64::MAX;

/// Errors raised while building or resolving a query spec
#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    /// A caller-supplied argument is out of range (reported at the call site)
    #[error("invalid argument: {name} must be non-negative, got {value}")]
    InvalidArgument { name: &'static str, value: i64 },

    /// The accumulated clauses contradict each other (reported at resolve time)
    #[error("invalid spec state: {0}")]
    InvalidSpecState(String),
}

/// What to do when a row lock cannot be taken immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LockContention {
    /// Wait for the lock (the in-memory engine reports a lock wait timeout)
    #[default]
    Default,
    /// Fail straight away
    NoWait,
    /// Leave locked rows out of the result
    SkipLocked,
}

/// Row-locking intent of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LockMode {
    #[default]
    None,
    Shared(LockContention),
    Exclusive(LockContention),
}

impl LockMode {
    pub fn contention(&self) -> Option<LockContention> {
        match self {
            LockMode::None => None,
            LockMode::Shared(c) | LockMode::Exclusive(c) => Some(*c),
        }
    }
}

/// A resolved query specification
///
/// Produced by [`QuerySpecBuilder::resolve`]. The snapshot owns its data, so
/// later changes to the builder never show up here.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QuerySpec {
    pub(crate) predicate: Option<String>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Option<String>,
    pub(crate) order_by: Vec<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) lock_mode: LockMode,
    pub(crate) bindings: BTreeMap<String, Value>,
}

impl QuerySpec {
    /// Search condition; `None` matches every row
    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn having(&self) -> Option<&str> {
        self.having.as_deref()
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn lock_mode(&self) -> LockMode {
        self.lock_mode
    }

    /// Values bound to `:name` placeholders, keyed without the colon
    pub fn bindings(&self) -> &BTreeMap<String, Value> {
        &self.bindings
    }

    /// Render the spec as a MySQL-flavoured SELECT against `table`
    /// Placeholders are left in place; bound values travel separately
    pub fn to_sql(&self, table: &str) -> String {
        let mut sql = format!("SELECT * FROM {}", table);

        if let Some(predicate) = &self.predicate {
            sql.push_str(&format!(" WHERE {}", predicate));
        }
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        if let Some(having) = &self.having {
            sql.push_str(&format!(" HAVING {}", having));
        }
        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", UNBOUNDED_LIMIT, offset))
            }
            (None, None) => {}
        }

        let (lock, contention) = match self.lock_mode {
            LockMode::None => return sql,
            LockMode::Shared(c) => ("FOR SHARE", c),
            LockMode::Exclusive(c) => ("FOR UPDATE", c),
        };
        sql.push(' ');
        sql.push_str(lock);
        match contention {
            LockContention::Default => {}
            LockContention::NoWait => sql.push_str(" NOWAIT"),
            LockContention::SkipLocked => sql.push_str(" SKIP LOCKED"),
        }
        sql
    }
}

impl fmt::Display for QuerySpec {
    /// Clause-only rendering, without the SELECT/FROM head
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = self.to_sql("_");
        let clauses = sql.trim_start_matches("SELECT * FROM _").trim_start();
        if clauses.is_empty() {
            write!(f, "(all rows)")
        } else {
            write!(f, "{}", clauses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all_clauses() {
        let spec = QuerySpec {
            predicate: Some("age > 18".to_string()),
            group_by: vec!["dept".to_string()],
            having: Some("count(*) > 1".to_string()),
            order_by: vec!["dept DESC".to_string(), "age".to_string()],
            limit: Some(10),
            offset: Some(5),
            lock_mode: LockMode::Exclusive(LockContention::SkipLocked),
            bindings: BTreeMap::new(),
        };

        assert_eq!(
            spec.to_sql("staff"),
            "SELECT * FROM staff WHERE age > 18 GROUP BY dept HAVING count(*) > 1 \
             ORDER BY dept DESC, age LIMIT 10 OFFSET 5 FOR UPDATE SKIP LOCKED"
        );
    }

    #[test]
    fn test_render_empty_spec() {
        let spec = QuerySpec::default();
        assert_eq!(spec.to_sql("mhs"), "SELECT * FROM mhs");
        assert_eq!(spec.to_string(), "(all rows)");
    }

    #[test]
    fn test_offset_without_limit_renders_unbounded_limit() {
        let spec = QuerySpec {
            offset: Some(3),
            lock_mode: LockMode::Shared(LockContention::NoWait),
            ..Default::default()
        };
        assert_eq!(
            spec.to_string(),
            "LIMIT 18446744073709551615 OFFSET 3 FOR SHARE NOWAIT"
        );
    }

    #[test]
    fn test_lock_mode_contention() {
        assert_eq!(LockMode::None.contention(), None);
        assert_eq!(
            LockMode::Shared(LockContention::NoWait).contention(),
            Some(LockContention::NoWait)
        );
    }

    #[test]
    fn test_serializes_to_json() {
        let spec = QuerySpec {
            limit: Some(2),
            lock_mode: LockMode::Shared(LockContention::Default),
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["limit"], 2);
        assert_eq!(json["lock_mode"]["Shared"], "Default");
        assert!(json["predicate"].is_null());
    }
}
