// Query spec builder
// Every setter replaces what was there before; nothing accumulates.
// A caller can keep refining the same logical query and resolve it again.

use super::{LockContention, LockMode, QuerySpec, SpecError};
use crate::storage::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Fluent builder for a [`QuerySpec`]
///
/// ```
/// use selectspec::QuerySpecBuilder;
///
/// let spec = QuerySpecBuilder::new()
///     .r#where("age > 18")
///     .order_by(["name", "age"])
///     .limit(10)?
///     .offset(5)?
///     .resolve()?;
///
/// assert_eq!(spec.limit(), Some(10));
/// # Ok::<(), selectspec::SpecError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct QuerySpecBuilder {
    predicate: Option<String>,
    group_by: Vec<String>,
    having: Option<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    lock_mode: LockMode,
    bindings: BTreeMap<String, Value>,
}

impl QuerySpecBuilder {
    /// Create an empty builder (matches every row, no window, no locks)
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the search condition
    /// An empty or blank predicate clears the filter
    pub fn r#where(&mut self, predicate: &str) -> &mut Self {
        self.predicate = non_blank(predicate);
        self
    }

    /// Replace the grouping expressions
    pub fn group_by<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the aggregate filter
    /// Checked against the grouping list at resolve time; an empty or blank
    /// expression clears it
    pub fn having(&mut self, expr: &str) -> &mut Self {
        self.having = non_blank(expr);
        self
    }

    /// Replace the sort expressions (`expr [ASC|DESC]`)
    pub fn order_by<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the row cap
    pub fn limit(&mut self, rows: i64) -> Result<&mut Self, SpecError> {
        self.limit = Some(non_negative("limit", rows)?);
        Ok(self)
    }

    /// Replace the number of rows skipped before the first returned row
    pub fn offset(&mut self, rows: i64) -> Result<&mut Self, SpecError> {
        self.offset = Some(non_negative("offset", rows)?);
        Ok(self)
    }

    /// Lock matching rows against updates
    pub fn lock_shared(&mut self) -> &mut Self {
        self.lock_shared_with(LockContention::Default)
    }

    pub fn lock_shared_with(&mut self, contention: LockContention) -> &mut Self {
        self.lock_mode = LockMode::Shared(contention);
        self
    }

    /// Lock matching rows so no other session can read-lock or write them
    pub fn lock_exclusive(&mut self) -> &mut Self {
        self.lock_exclusive_with(LockContention::Default)
    }

    pub fn lock_exclusive_with(&mut self, contention: LockContention) -> &mut Self {
        self.lock_mode = LockMode::Exclusive(contention);
        self
    }

    /// Bind a value to the `:name` placeholder
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let name = name.trim_start_matches(':');
        self.bindings.insert(name.to_string(), value.into());
        self
    }

    pub fn clear_bindings(&mut self) -> &mut Self {
        self.bindings.clear();
        self
    }

    /// Validate the accumulated clauses and take a snapshot
    pub fn resolve(&self) -> Result<QuerySpec, SpecError> {
        if self.having.is_some() && self.group_by.is_empty() {
            return Err(SpecError::InvalidSpecState(
                "HAVING requires at least one GROUP BY expression".to_string(),
            ));
        }

        let spec = QuerySpec {
            predicate: self.predicate.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            lock_mode: self.lock_mode,
            bindings: self.bindings.clone(),
        };
        debug!(spec = %spec, "resolved query spec");
        Ok(spec)
    }
}

/// Blank fragments clear a clause; anything else is kept verbatim
fn non_blank(fragment: &str) -> Option<String> {
    if fragment.trim().is_empty() {
        None
    } else {
        Some(fragment.to_string())
    }
}

fn non_negative(name: &'static str, value: i64) -> Result<u64, SpecError> {
    u64::try_from(value).map_err(|_| SpecError::InvalidArgument { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_replaces_previous_predicate() {
        let mut builder = QuerySpecBuilder::new();
        builder.r#where("a = 1").r#where("b = 2").r#where("c = 3");

        let spec = builder.resolve().unwrap();
        assert_eq!(spec.predicate(), Some("c = 3"));
    }

    #[test]
    fn test_empty_where_clears_predicate() {
        let mut builder = QuerySpecBuilder::new();
        builder.r#where("a = 1").r#where("");
        assert_eq!(builder.resolve().unwrap().predicate(), None);

        builder.r#where("a = 1").r#where("   ");
        assert_eq!(builder.resolve().unwrap().predicate(), None);
    }

    #[test]
    fn test_where_keeps_surrounding_whitespace() {
        let mut builder = QuerySpecBuilder::new();
        builder.r#where(" age > 18 ");
        assert_eq!(builder.resolve().unwrap().predicate(), Some(" age > 18 "));
    }

    #[test]
    fn test_blank_having_clears_expression() {
        let mut builder = QuerySpecBuilder::new();
        builder.group_by(["dept"]).having("count(*) > 1").having("");
        assert_eq!(builder.resolve().unwrap().having(), None);

        builder.having("count(*) > 1").having(" \t");
        assert_eq!(builder.resolve().unwrap().having(), None);

        // nothing left to validate once the grouping goes too
        builder.group_by(Vec::<String>::new());
        assert!(builder.resolve().is_ok());
    }

    #[test]
    fn test_having_without_group_by_fails() {
        let mut builder = QuerySpecBuilder::new();
        builder.having("x");
        assert!(matches!(
            builder.resolve(),
            Err(SpecError::InvalidSpecState(_))
        ));
    }

    #[test]
    fn test_group_by_with_having() {
        let mut builder = QuerySpecBuilder::new();
        builder.group_by(["dept"]).having("count(*) > 1");

        let spec = builder.resolve().unwrap();
        assert_eq!(spec.group_by(), ["dept"]);
        assert_eq!(spec.having(), Some("count(*) > 1"));
    }

    #[test]
    fn test_group_by_and_order_by_replace_whole_list() {
        let mut builder = QuerySpecBuilder::new();
        builder
            .group_by(["a", "b"])
            .group_by(vec!["c".to_string(), "c".to_string()])
            .order_by(["x"])
            .order_by(["z DESC", "y"]);

        let spec = builder.resolve().unwrap();
        assert_eq!(spec.group_by(), ["c", "c"]);
        assert_eq!(spec.order_by(), ["z DESC", "y"]);
    }

    #[test]
    fn test_clearing_group_by_invalidates_having() {
        let mut builder = QuerySpecBuilder::new();
        builder.group_by(["dept"]).having("count(*) > 1");
        assert!(builder.resolve().is_ok());

        builder.group_by(Vec::<String>::new());
        assert!(builder.resolve().is_err());
    }

    #[test]
    fn test_negative_limit_and_offset_rejected() {
        let mut builder = QuerySpecBuilder::new();
        assert_eq!(
            builder.limit(-1).unwrap_err(),
            SpecError::InvalidArgument {
                name: "limit",
                value: -1
            }
        );
        assert!(matches!(
            builder.offset(-7),
            Err(SpecError::InvalidArgument { name: "offset", .. })
        ));

        // rejected calls leave the builder untouched
        let spec = builder.resolve().unwrap();
        assert_eq!(spec.limit(), None);
        assert_eq!(spec.offset(), None);
    }

    #[test]
    fn test_zero_limit_is_kept() {
        let mut builder = QuerySpecBuilder::new();
        builder.limit(0).unwrap();
        assert_eq!(builder.resolve().unwrap().limit(), Some(0));
    }

    #[test]
    fn test_offset_without_limit_is_accepted() {
        let mut builder = QuerySpecBuilder::new();
        builder.offset(4).unwrap();

        let spec = builder.resolve().unwrap();
        assert_eq!(spec.offset(), Some(4));
        assert_eq!(spec.limit(), None);
    }

    #[test]
    fn test_later_lock_call_wins() {
        let mut builder = QuerySpecBuilder::new();
        builder
            .lock_shared_with(LockContention::NoWait)
            .lock_exclusive();
        assert_eq!(
            builder.resolve().unwrap().lock_mode(),
            LockMode::Exclusive(LockContention::Default)
        );

        builder.lock_shared();
        assert_eq!(
            builder.resolve().unwrap().lock_mode(),
            LockMode::Shared(LockContention::Default)
        );
    }

    #[test]
    fn test_repeated_resolve_is_stable() {
        let mut builder = QuerySpecBuilder::new();
        builder.r#where("x > 1").order_by(["x"]).limit(3).unwrap();
        assert_eq!(builder.resolve().unwrap(), builder.resolve().unwrap());
    }

    #[test]
    fn test_snapshot_is_independent_of_builder() {
        let mut builder = QuerySpecBuilder::new();
        builder.r#where("x > 1").bind("min", 4i64);
        let before = builder.resolve().unwrap();

        builder.r#where("x > 2").limit(1).unwrap();
        builder.bind("min", 9i64);

        assert_eq!(before.predicate(), Some("x > 1"));
        assert_eq!(before.limit(), None);
        assert_eq!(before.bindings()["min"], Value::Integer(4));
    }

    #[test]
    fn test_bind_strips_colon_and_replaces() {
        let mut builder = QuerySpecBuilder::new();
        builder.bind(":dept", "IT").bind("dept", "SI").bind("n", true);

        let spec = builder.resolve().unwrap();
        assert_eq!(spec.bindings().len(), 2);
        assert_eq!(spec.bindings()["dept"], Value::Text("SI".to_string()));

        builder.clear_bindings();
        assert!(builder.resolve().unwrap().bindings().is_empty());
    }

    #[test]
    fn test_end_to_end_resolution() -> Result<(), SpecError> {
        let spec = QuerySpecBuilder::new()
            .r#where("age > 18")
            .order_by(["name", "age"])
            .limit(10)?
            .offset(5)?
            .resolve()?;

        let expected = QuerySpec {
            predicate: Some("age > 18".to_string()),
            group_by: vec![],
            having: None,
            order_by: vec!["name".to_string(), "age".to_string()],
            limit: Some(10),
            offset: Some(5),
            lock_mode: LockMode::None,
            bindings: BTreeMap::new(),
        };
        assert_eq!(spec, expected);
        Ok(())
    }
}
