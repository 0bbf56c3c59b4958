// Query Executor
// This module loads tables and runs resolved query specs against them

use super::eval::{check_columns, contains_aggregate, EvalContext};
use super::lock::{LockKind, LockTable, SessionId};
use super::parser::{CompiledQuery, Projection, QueryParser, SortField, Statement};
use crate::spec::{LockContention, LockMode, QuerySpec};
use crate::storage::{table::Table, Row, Schema, Value};
use anyhow::{anyhow, Result};
use sqlparser::ast::{Expr, Ident};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

/// The query executor manages all tables and the row locks taken on them
pub struct QueryExecutor {
    /// HashMap storing all tables by name
    tables: HashMap<String, Table>,
    locks: LockTable,
}

impl QueryExecutor {
    /// Create a new query executor (empty database)
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            locks: LockTable::new(),
        }
    }

    /// Execute a loader statement
    pub fn execute(&mut self, statement: Statement) -> Result<QueryResult> {
        match statement {
            Statement::CreateTable { name, schema } => {
                // Check if table already exists
                if self.tables.contains_key(&name) {
                    return Err(anyhow!("Table '{}' already exists", name));
                }

                let table = Table::new(name.clone(), schema);
                self.tables.insert(name.clone(), table);
                debug!(table = %name, "table created");

                Ok(QueryResult::Message(format!("Table '{}' created", name)))
            }

            Statement::Insert { table_name, rows } => {
                let table = self
                    .tables
                    .get_mut(&table_name)
                    .ok_or_else(|| anyhow!("Table '{}' not found", table_name))?;

                let count = rows.len();
                for values in rows {
                    table.insert(values)?;
                }

                Ok(QueryResult::Message(format!(
                    "{} row(s) inserted into '{}'",
                    count, table_name
                )))
            }
        }
    }

    /// Parse and execute every statement of a loader script
    pub fn run_script(&mut self, sql: &str) -> Result<()> {
        for statement in QueryParser::parse_script(sql)? {
            self.execute(statement)?;
        }
        Ok(())
    }

    /// Run a resolved spec against `table_name` on behalf of `session`
    ///
    /// `fields` is the select list (`expr [AS alias]`); empty selects every
    /// column. Locks requested by the spec are held by `session` until
    /// [`QueryExecutor::release`].
    pub fn select(
        &mut self,
        session: SessionId,
        table_name: &str,
        fields: &[&str],
        spec: &QuerySpec,
    ) -> Result<QueryResult> {
        let table = self
            .tables
            .get(table_name)
            .ok_or_else(|| anyhow!("Table '{}' not found", table_name))?;
        let schema = table.get_schema();
        let bindings = spec.bindings();
        let compiled = QueryParser::compile(spec, fields)?;
        let (column_names, exprs) = output_columns(&compiled, table);
        let order_by: Vec<SortField> = compiled
            .order_by
            .iter()
            .map(|field| resolve_alias(field, schema, &column_names, &exprs))
            .collect();

        // Column references are checked up front so errors do not depend on the data
        let referenced = compiled
            .predicate
            .iter()
            .chain(&compiled.group_by)
            .chain(&compiled.having)
            .chain(order_by.iter().map(|field| &field.expr))
            .chain(&exprs);
        for expr in referenced {
            check_columns(expr, schema)?;
        }

        // Filter
        let mut matched: Vec<(usize, &Row)> = Vec::new();
        for (row_id, row) in table.scan() {
            let keep = match &compiled.predicate {
                Some(predicate) => {
                    let single = [row];
                    EvalContext::row(schema, &single, bindings).matches(predicate)?
                }
                None => true,
            };
            if keep {
                matched.push((row_id, row));
            }
        }
        debug!(table = table_name, matched = matched.len(), "filtered rows");

        // Lock
        let lock = lock_request(spec.lock_mode());
        if let Some((kind, contention)) = lock {
            let blocked = matched
                .iter()
                .filter(|(row_id, _)| self.locks.conflicts(session, table_name, *row_id, kind))
                .count();

            if blocked > 0 {
                warn!(%session, table = table_name, blocked, ?contention, "row lock conflict");
                match contention {
                    LockContention::Default => {
                        return Err(anyhow!(
                            "Lock wait timeout exceeded on {} row(s) of '{}'; try restarting transaction",
                            blocked,
                            table_name
                        ))
                    }
                    LockContention::NoWait => {
                        return Err(anyhow!(
                            "Statement aborted because lock(s) on '{}' could not be acquired immediately and NOWAIT is set",
                            table_name
                        ))
                    }
                    LockContention::SkipLocked => matched.retain(|(row_id, _)| {
                        !self.locks.conflicts(session, table_name, *row_id, kind)
                    }),
                }
            }
        }
        // Acquired only once the whole result has been built
        let row_ids: Vec<usize> = matched.iter().map(|(row_id, _)| *row_id).collect();

        let rows: Vec<&Row> = matched.into_iter().map(|(_, row)| row).collect();

        // Group
        let grouped = !compiled.group_by.is_empty()
            || compiled.having.as_ref().is_some_and(contains_aggregate)
            || order_by.iter().any(|o| contains_aggregate(&o.expr))
            || exprs.iter().any(contains_aggregate);

        let mut groups: Vec<Vec<&Row>> = if grouped {
            group_rows(&compiled.group_by, &rows, table, bindings)?
        } else {
            rows.iter().map(|row| vec![*row]).collect()
        };

        // Having
        if let Some(having) = &compiled.having {
            let mut kept = Vec::with_capacity(groups.len());
            for group in groups {
                if EvalContext::group(schema, &group, bindings).matches(having)? {
                    kept.push(group);
                }
            }
            groups = kept;
        }

        // Order
        if !order_by.is_empty() {
            groups = sort_groups(groups, &order_by, table, bindings)?;
        }

        // Window
        let offset = usize::try_from(spec.offset().unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = spec
            .limit()
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        // Project
        let mut result_rows = Vec::new();
        for group in groups.iter().skip(offset).take(limit) {
            let ctx = EvalContext::group(schema, group, bindings);
            let values = exprs
                .iter()
                .map(|expr| ctx.evaluate(expr))
                .collect::<Result<Vec<_>>>()?;
            result_rows.push(Row::new(values));
        }
        if let Some((kind, _)) = lock {
            self.locks.acquire(session, table_name, &row_ids, kind);
        }
        debug!(table = table_name, returned = result_rows.len(), "query complete");

        Ok(QueryResult::Rows {
            rows: result_rows,
            column_names,
        })
    }

    /// Same as [`QueryExecutor::select`] for every column, in the default session
    pub fn find(&mut self, table_name: &str, spec: &QuerySpec) -> Result<QueryResult> {
        self.select(SessionId::default(), table_name, &[], spec)
    }

    /// Release every row lock held by `session`
    pub fn release(&mut self, session: SessionId) -> usize {
        let released = self.locks.release(session);
        debug!(%session, released, "locks released");
        released
    }

    /// Get a reference to a table (useful for direct access)
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// List all tables in the database
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }
}

fn lock_request(mode: LockMode) -> Option<(LockKind, LockContention)> {
    match mode {
        LockMode::None => None,
        LockMode::Shared(c) => Some((LockKind::Shared, c)),
        LockMode::Exclusive(c) => Some((LockKind::Exclusive, c)),
    }
}

/// Expand the projection into output names and expressions
fn output_columns(compiled: &CompiledQuery, table: &Table) -> (Vec<String>, Vec<Expr>) {
    let mut names = Vec::new();
    let mut exprs = Vec::new();
    for item in &compiled.projection {
        match item {
            Projection::AllColumns => {
                for column in &table.get_schema().columns {
                    names.push(column.name.clone());
                    exprs.push(Expr::Identifier(Ident::new(column.name.clone())));
                }
            }
            Projection::Expr { expr, name } => {
                names.push(name.clone());
                exprs.push(expr.clone());
            }
        }
    }
    (names, exprs)
}

/// ORDER BY may name a select-list alias that is not a table column
fn resolve_alias(field: &SortField, schema: &Schema, names: &[String], exprs: &[Expr]) -> SortField {
    if let Expr::Identifier(ident) = &field.expr {
        if schema.get_column_index(&ident.value).is_none() {
            if let Some(index) = names.iter().position(|n| n.eq_ignore_ascii_case(&ident.value)) {
                return SortField {
                    expr: exprs[index].clone(),
                    descending: field.descending,
                };
            }
        }
    }
    field.clone()
}

/// Bucket rows by their grouping key, in order of first appearance.
/// Without grouping expressions the whole input is one group, even when empty.
fn group_rows<'a>(
    group_by: &[Expr],
    rows: &[&'a Row],
    table: &Table,
    bindings: &std::collections::BTreeMap<String, Value>,
) -> Result<Vec<Vec<&'a Row>>> {
    if group_by.is_empty() {
        return Ok(vec![rows.to_vec()]);
    }

    let mut keys: Vec<Vec<Value>> = Vec::new();
    let mut groups: Vec<Vec<&'a Row>> = Vec::new();
    for row in rows {
        let single = [*row];
        let ctx = EvalContext::row(table.get_schema(), &single, bindings);
        let key = group_by
            .iter()
            .map(|expr| ctx.evaluate(expr))
            .collect::<Result<Vec<_>>>()?;

        match keys.iter().position(|k| *k == key) {
            Some(index) => groups[index].push(*row),
            None => {
                keys.push(key);
                groups.push(vec![*row]);
            }
        }
    }
    Ok(groups)
}

/// Stable sort of groups by the sort fields, NULLs first when ascending
fn sort_groups<'a>(
    groups: Vec<Vec<&'a Row>>,
    order_by: &[SortField],
    table: &Table,
    bindings: &std::collections::BTreeMap<String, Value>,
) -> Result<Vec<Vec<&'a Row>>> {
    let mut keyed = Vec::with_capacity(groups.len());
    for group in groups {
        let ctx = EvalContext::group(table.get_schema(), &group, bindings);
        let key = order_by
            .iter()
            .map(|field| ctx.evaluate(&field.expr))
            .collect::<Result<Vec<_>>>()?;
        keyed.push((key, group));
    }

    keyed.sort_by(|(a, _), (b, _)| {
        for (field, (x, y)) in order_by.iter().zip(a.iter().zip(b)) {
            let ord = x.sort_cmp(y);
            let ord = if field.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    Ok(keyed.into_iter().map(|(_, group)| group).collect())
}

/// Represents the result of a query execution
#[derive(Debug)]
pub enum QueryResult {
    /// Rows returned from a SELECT query
    Rows {
        rows: Vec<Row>,
        column_names: Vec<String>,
    },
    /// A message (for CREATE, INSERT)
    Message(String),
}

impl QueryResult {
    /// Rows of a result; empty for messages
    pub fn rows(&self) -> &[Row] {
        match self {
            QueryResult::Rows { rows, .. } => rows,
            QueryResult::Message(_) => &[],
        }
    }

    pub fn column_names(&self) -> &[String] {
        match self {
            QueryResult::Rows { column_names, .. } => column_names,
            QueryResult::Message(_) => &[],
        }
    }

    /// Values of one output column, by name
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let index = self
            .column_names()
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))?;
        Some(self.rows().iter().map(|r| r.values[index].clone()).collect())
    }

    /// Format the result as a string for display
    /// This creates a boxed table for row results
    pub fn format(&self) -> String {
        match self {
            QueryResult::Message(msg) => msg.clone(),
            QueryResult::Rows { rows, column_names } => {
                if rows.is_empty() {
                    return "No rows found".to_string();
                }

                // Calculate column widths
                let mut widths: Vec<usize> =
                    column_names.iter().map(|c| c.chars().count()).collect();
                for row in rows {
                    for (i, value) in row.values.iter().enumerate() {
                        widths[i] = widths[i].max(value.to_string().chars().count());
                    }
                }

                let border = |left: &str, mid: &str, right: &str| {
                    let cells: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
                    format!("{}{}{}\n", left, cells.join(mid), right)
                };
                let line = |cells: Vec<String>| {
                    let mut out = String::from("│");
                    for (cell, width) in cells.iter().zip(&widths) {
                        out.push_str(&format!(" {:<width$} │", cell, width = width));
                    }
                    out.push('\n');
                    out
                };

                let mut result = border("┌", "┬", "┐");
                result.push_str(&line(column_names.clone()));
                result.push_str(&border("├", "┼", "┤"));
                for row in rows {
                    result.push_str(&line(row.values.iter().map(|v| v.to_string()).collect()));
                }
                result.push_str(&border("└", "┴", "┘"));
                result.push_str(&format!("\n{} row(s) returned", rows.len()));

                result
            }
        }
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}
