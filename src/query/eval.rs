// Expression evaluation
// Evaluates compiled expressions against one row (WHERE) or a group of rows
// (projection, HAVING and ORDER BY of grouped queries).
// NULL follows SQL three-valued logic: comparisons with NULL yield NULL and
// only a TRUE condition keeps a row.

use super::parser::parse_number;
use crate::storage::{Row, Schema, Value};
use anyhow::{anyhow, Result};
use sqlparser::ast::{
    BinaryOperator, DuplicateTreatment, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, UnaryOperator, Value as SqlValue,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

const AGGREGATES: [&str; 5] = ["count", "sum", "avg", "min", "max"];

/// What an expression is evaluated against
pub struct EvalContext<'a> {
    schema: &'a Schema,
    /// One row for WHERE, the whole group otherwise
    rows: &'a [&'a Row],
    bindings: &'a BTreeMap<String, Value>,
    allow_aggregates: bool,
}

impl<'a> EvalContext<'a> {
    /// Context for a single row; aggregates are rejected
    pub fn row(
        schema: &'a Schema,
        row: &'a [&'a Row],
        bindings: &'a BTreeMap<String, Value>,
    ) -> Self {
        Self {
            schema,
            rows: row,
            bindings,
            allow_aggregates: false,
        }
    }

    /// Context for a group; plain column references read the first row
    pub fn group(
        schema: &'a Schema,
        rows: &'a [&'a Row],
        bindings: &'a BTreeMap<String, Value>,
    ) -> Self {
        Self {
            schema,
            rows,
            bindings,
            allow_aggregates: true,
        }
    }

    /// Evaluate a condition; only TRUE passes
    pub fn matches(&self, expr: &Expr) -> Result<bool> {
        Ok(truth(&self.evaluate(expr)?)? == Some(true))
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Identifier(ident) => self.column(&ident.value),
            Expr::CompoundIdentifier(idents) => match idents.last() {
                Some(ident) => self.column(&ident.value),
                None => Err(anyhow!("Empty column reference")),
            },
            Expr::Value(value) => self.literal(value),
            Expr::Nested(inner) => self.evaluate(inner),
            Expr::UnaryOp { op, expr } => {
                let value = self.evaluate(expr)?;
                match op {
                    UnaryOperator::Not => Ok(match truth(&value)? {
                        Some(b) => Value::Boolean(!b),
                        None => Value::Null,
                    }),
                    UnaryOperator::Minus => match value {
                        Value::Integer(i) => i
                            .checked_neg()
                            .map(Value::Integer)
                            .ok_or_else(|| anyhow!("Integer overflow")),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        Value::Null => Ok(Value::Null),
                        other => Err(anyhow!("Cannot negate {}", other.to_sql_literal())),
                    },
                    UnaryOperator::Plus => Ok(value),
                    _ => Err(anyhow!("Unsupported operator: {}", op)),
                }
            }
            Expr::BinaryOp { left, op, right } => self.binary(left, op, right),
            Expr::IsNull(inner) => Ok(Value::Boolean(self.evaluate(inner)?.is_null())),
            Expr::IsNotNull(inner) => Ok(Value::Boolean(!self.evaluate(inner)?.is_null())),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let value = self.evaluate(expr)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let item = self.evaluate(item)?;
                    if item.is_null() {
                        saw_null = true;
                    } else if value.compare(&item) == Some(Ordering::Equal) {
                        return Ok(Value::Boolean(!negated));
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Boolean(*negated)
                })
            }
            Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let value = self.evaluate(expr)?;
                let low = self.evaluate(low)?;
                let high = self.evaluate(high)?;
                if value.is_null() || low.is_null() || high.is_null() {
                    return Ok(Value::Null);
                }
                let inside = compare(&value, &low)? != Ordering::Less
                    && compare(&value, &high)? != Ordering::Greater;
                Ok(Value::Boolean(inside != *negated))
            }
            Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => match (self.evaluate(expr)?, self.evaluate(pattern)?) {
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                (value, Value::Text(pattern)) => Ok(Value::Boolean(
                    like(&value.to_string(), &pattern) != *negated,
                )),
                (_, other) => Err(anyhow!("LIKE pattern must be text, got {}", other)),
            },
            Expr::Function(function) => self.function(function),
            _ => Err(anyhow!("Unsupported expression: {}", expr)),
        }
    }

    fn column(&self, name: &str) -> Result<Value> {
        let index = self
            .schema
            .get_column_index(name)
            .ok_or_else(|| anyhow!("Unknown column '{}'", name))?;
        Ok(self
            .rows
            .first()
            .map(|row| row.values[index].clone())
            .unwrap_or(Value::Null))
    }

    fn literal(&self, value: &SqlValue) -> Result<Value> {
        match value {
            SqlValue::Number(n, _) => parse_number(n),
            SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
                Ok(Value::Text(s.clone()))
            }
            SqlValue::Boolean(b) => Ok(Value::Boolean(*b)),
            SqlValue::Null => Ok(Value::Null),
            SqlValue::Placeholder(p) => {
                let name = p.trim_start_matches(['$', ':']);
                self.bindings
                    .get(name)
                    .cloned()
                    .ok_or_else(|| anyhow!("No value bound to placeholder ':{}'", name))
            }
            _ => Err(anyhow!("Unsupported literal: {}", value)),
        }
    }

    fn binary(&self, left: &Expr, op: &BinaryOperator, right: &Expr) -> Result<Value> {
        let lhs = self.evaluate(left)?;

        // AND / OR short-circuit on a decided left side
        match op {
            BinaryOperator::And => {
                let l = truth(&lhs)?;
                if l == Some(false) {
                    return Ok(Value::Boolean(false));
                }
                let r = truth(&self.evaluate(right)?)?;
                return Ok(match (l, r) {
                    (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                });
            }
            BinaryOperator::Or => {
                let l = truth(&lhs)?;
                if l == Some(true) {
                    return Ok(Value::Boolean(true));
                }
                let r = truth(&self.evaluate(right)?)?;
                return Ok(match (l, r) {
                    (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                });
            }
            _ => {}
        }

        let rhs = self.evaluate(right)?;
        if lhs.is_null() || rhs.is_null() {
            return Ok(Value::Null);
        }

        match op {
            BinaryOperator::Eq => Ok(Value::Boolean(compare(&lhs, &rhs)? == Ordering::Equal)),
            BinaryOperator::NotEq => {
                Ok(Value::Boolean(compare(&lhs, &rhs)? != Ordering::Equal))
            }
            BinaryOperator::Lt => Ok(Value::Boolean(compare(&lhs, &rhs)? == Ordering::Less)),
            BinaryOperator::LtEq => {
                Ok(Value::Boolean(compare(&lhs, &rhs)? != Ordering::Greater))
            }
            BinaryOperator::Gt => Ok(Value::Boolean(compare(&lhs, &rhs)? == Ordering::Greater)),
            BinaryOperator::GtEq => Ok(Value::Boolean(compare(&lhs, &rhs)? != Ordering::Less)),
            BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => arithmetic(&lhs, op, &rhs),
            _ => Err(anyhow!("Unsupported operator: {}", op)),
        }
    }

    fn function(&self, function: &Function) -> Result<Value> {
        let name = function.name.to_string().to_lowercase();
        let (args, distinct) = function_args(function)?;

        if AGGREGATES.contains(&name.as_str()) {
            if !self.allow_aggregates {
                return Err(anyhow!("Aggregate function {}() is not allowed here", name));
            }
            return self.aggregate(&name, &args, distinct);
        }

        let values = args
            .iter()
            .map(|arg| match arg {
                FunctionArgExpr::Expr(expr) => self.evaluate(expr),
                _ => Err(anyhow!("Wildcard argument is only valid in count(*)")),
            })
            .collect::<Result<Vec<_>>>()?;

        match (name.as_str(), values.as_slice()) {
            ("coalesce", values) => Ok(values
                .iter()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null)),
            (_, [Value::Null]) => Ok(Value::Null),
            ("upper", [value]) => Ok(Value::Text(value.to_string().to_uppercase())),
            ("lower", [value]) => Ok(Value::Text(value.to_string().to_lowercase())),
            ("length", [value]) => Ok(Value::Integer(value.to_string().len() as i64)),
            ("abs", [Value::Integer(i)]) => i
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| anyhow!("Integer overflow")),
            ("abs", [Value::Float(f)]) => Ok(Value::Float(f.abs())),
            _ => Err(anyhow!(
                "Unsupported function call {}() with {} argument(s)",
                name,
                values.len()
            )),
        }
    }

    fn aggregate(&self, name: &str, args: &[&FunctionArgExpr], distinct: bool) -> Result<Value> {
        let expr = match (name, args) {
            ("count", [FunctionArgExpr::Wildcard]) => {
                return Ok(Value::Integer(self.rows.len() as i64));
            }
            (_, [FunctionArgExpr::Expr(expr)]) => expr,
            _ => return Err(anyhow!("{}() takes exactly one argument", name)),
        };

        // Evaluate the argument per row, skipping NULLs
        let mut values: Vec<Value> = Vec::new();
        for row in self.rows {
            let single = [*row];
            let ctx = EvalContext::row(self.schema, &single, self.bindings);
            let value = ctx.evaluate(expr)?;
            if value.is_null() || (distinct && values.contains(&value)) {
                continue;
            }
            values.push(value);
        }

        match name {
            "count" => Ok(Value::Integer(values.len() as i64)),
            "min" | "max" => {
                let mut best: Option<Value> = None;
                for value in values {
                    best = match best {
                        None => Some(value),
                        Some(current) => {
                            let ord = compare(&value, &current)?;
                            let better = if name == "min" {
                                ord == Ordering::Less
                            } else {
                                ord == Ordering::Greater
                            };
                            Some(if better { value } else { current })
                        }
                    };
                }
                Ok(best.unwrap_or(Value::Null))
            }
            "sum" | "avg" => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let all_integers = values.iter().all(|v| matches!(v, Value::Integer(_)));
                if name == "sum" && all_integers {
                    let mut total: i64 = 0;
                    for value in &values {
                        if let Value::Integer(i) = value {
                            total = total
                                .checked_add(*i)
                                .ok_or_else(|| anyhow!("Integer overflow in sum()"))?;
                        }
                    }
                    return Ok(Value::Integer(total));
                }
                let mut total = 0.0;
                for value in &values {
                    total += value
                        .as_f64()
                        .ok_or_else(|| anyhow!("{}() needs numeric values, got {}", name, value))?;
                }
                if name == "avg" {
                    total /= values.len() as f64;
                }
                Ok(Value::Float(total))
            }
            _ => Err(anyhow!("Unknown aggregate {}()", name)),
        }
    }
}

/// Whether an expression contains an aggregate call anywhere
pub fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Function(function) => {
            let name = function.name.to_string().to_lowercase();
            AGGREGATES.contains(&name.as_str())
                || function_args(function)
                    .map(|(args, _)| {
                        args.iter().any(|arg| match arg {
                            FunctionArgExpr::Expr(e) => contains_aggregate(e),
                            _ => false,
                        })
                    })
                    .unwrap_or(false)
        }
        Expr::Nested(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => contains_aggregate(e),
        Expr::UnaryOp { expr, .. } => contains_aggregate(expr),
        Expr::BinaryOp { left, right, .. } => contains_aggregate(left) || contains_aggregate(right),
        Expr::InList { expr, list, .. } => {
            contains_aggregate(expr) || list.iter().any(contains_aggregate)
        }
        Expr::Between {
            expr, low, high, ..
        } => contains_aggregate(expr) || contains_aggregate(low) || contains_aggregate(high),
        Expr::Like { expr, pattern, .. } => contains_aggregate(expr) || contains_aggregate(pattern),
        _ => false,
    }
}

/// Fail on the first column reference the schema does not have
pub fn check_columns(expr: &Expr, schema: &Schema) -> Result<()> {
    match expr {
        Expr::Identifier(ident) => check_column(&ident.value, schema),
        Expr::CompoundIdentifier(idents) => match idents.last() {
            Some(ident) => check_column(&ident.value, schema),
            None => Err(anyhow!("Empty column reference")),
        },
        Expr::Function(function) => {
            let (args, _) = function_args(function)?;
            check_all(
                args.into_iter().filter_map(|arg| match arg {
                    FunctionArgExpr::Expr(e) => Some(e),
                    _ => None,
                }),
                schema,
            )
        }
        Expr::Nested(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => check_columns(e, schema),
        Expr::UnaryOp { expr, .. } => check_columns(expr, schema),
        Expr::BinaryOp { left, right, .. } => check_all([&**left, &**right], schema),
        Expr::InList { expr, list, .. } => {
            check_columns(expr, schema)?;
            check_all(list, schema)
        }
        Expr::Between {
            expr, low, high, ..
        } => check_all([&**expr, &**low, &**high], schema),
        Expr::Like { expr, pattern, .. } => check_all([&**expr, &**pattern], schema),
        _ => Ok(()),
    }
}

fn check_all<'e>(exprs: impl IntoIterator<Item = &'e Expr>, schema: &Schema) -> Result<()> {
    for expr in exprs {
        check_columns(expr, schema)?;
    }
    Ok(())
}

fn check_column(name: &str, schema: &Schema) -> Result<()> {
    match schema.get_column_index(name) {
        Some(_) => Ok(()),
        None => Err(anyhow!("Unknown column '{}'", name)),
    }
}

fn function_args(function: &Function) -> Result<(Vec<&FunctionArgExpr>, bool)> {
    match &function.args {
        FunctionArguments::None => Ok((Vec::new(), false)),
        FunctionArguments::List(list) => {
            let args = list
                .args
                .iter()
                .map(|arg| match arg {
                    FunctionArg::Unnamed(arg) => Ok(arg),
                    _ => Err(anyhow!("Named arguments are not supported")),
                })
                .collect::<Result<Vec<_>>>()?;
            let distinct = matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct));
            Ok((args, distinct))
        }
        FunctionArguments::Subquery(_) => Err(anyhow!("Subqueries are not supported")),
    }
}

/// SQL truth value of a condition result
fn truth(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        Value::Integer(i) => Ok(Some(*i != 0)),
        Value::Float(f) => Ok(Some(*f != 0.0)),
        Value::Text(s) => Err(anyhow!("Text '{}' used as a condition", s)),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Ordering> {
    lhs.compare(rhs).ok_or_else(|| {
        anyhow!(
            "Cannot compare {} with {}",
            lhs.to_sql_literal(),
            rhs.to_sql_literal()
        )
    })
}

fn arithmetic(lhs: &Value, op: &BinaryOperator, rhs: &Value) -> Result<Value> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        let result = match op {
            BinaryOperator::Plus => a.checked_add(*b),
            BinaryOperator::Minus => a.checked_sub(*b),
            BinaryOperator::Multiply => a.checked_mul(*b),
            BinaryOperator::Modulo if *b == 0 => return Ok(Value::Null),
            BinaryOperator::Modulo => a.checked_rem(*b),
            // `/` always yields a fractional result, as in MySQL
            _ => None,
        };
        if let Some(result) = result {
            return Ok(Value::Integer(result));
        }
        if !matches!(op, BinaryOperator::Divide) {
            return Err(anyhow!("Integer overflow in {} {} {}", a, op, b));
        }
    }

    let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(anyhow!(
                "Arithmetic needs numbers, got {} {} {}",
                lhs.to_sql_literal(),
                op,
                rhs.to_sql_literal()
            ))
        }
    };
    match op {
        BinaryOperator::Plus => Ok(Value::Float(a + b)),
        BinaryOperator::Minus => Ok(Value::Float(a - b)),
        BinaryOperator::Multiply => Ok(Value::Float(a * b)),
        // Division by zero is NULL in MySQL
        BinaryOperator::Divide | BinaryOperator::Modulo if b == 0.0 => Ok(Value::Null),
        BinaryOperator::Divide => Ok(Value::Float(a / b)),
        BinaryOperator::Modulo => Ok(Value::Float(a % b)),
        _ => Err(anyhow!("Unsupported operator: {}", op)),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LikeToken {
    /// `%`
    Any,
    /// `_`
    One,
    Char(char),
}

/// Case-insensitive LIKE with `%` and `_` wildcards and `\` escapes
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let mut tokens = Vec::new();
    let pattern = pattern.to_lowercase();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
            c => LikeToken::Char(c),
        });
    }

    // Greedy match that backtracks only to the most recent `%`
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::Any) => {
                star = Some((p, t));
                p += 1;
            }
            Some(LikeToken::One) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    star = Some((star_p, star_t + 1));
                    p = star_p + 1;
                    t = star_t + 1;
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == LikeToken::Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::QueryParser;
    use crate::storage::{Column, DataType};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("name", DataType::Text),
            Column::new("age", DataType::Integer),
            Column::new("score", DataType::Float),
        ])
    }

    fn row(name: &str, age: Option<i64>, score: f64) -> Row {
        Row::new(vec![
            Value::from(name),
            age.map(Value::Integer).unwrap_or(Value::Null),
            Value::Float(score),
        ])
    }

    fn eval_row(expr: &str, row: &Row) -> Result<Value> {
        let schema = schema();
        let bindings = BTreeMap::from([("min".to_string(), Value::Integer(20))]);
        let rows = [row];
        let expr = QueryParser::parse_expr(expr)?;
        EvalContext::row(&schema, &rows, &bindings).evaluate(&expr)
    }

    #[test]
    fn test_comparisons_and_logic() {
        let r = row("Ana", Some(21), 3.5);
        assert_eq!(eval_row("age > 18 AND name = 'Ana'", &r).unwrap(), Value::Boolean(true));
        assert_eq!(eval_row("age < 18 OR score >= 3.5", &r).unwrap(), Value::Boolean(true));
        assert_eq!(eval_row("NOT (age <> 21)", &r).unwrap(), Value::Boolean(true));
        assert_eq!(eval_row("age BETWEEN 21 AND 30", &r).unwrap(), Value::Boolean(true));
        assert_eq!(eval_row("name IN ('Budi', 'Ana')", &r).unwrap(), Value::Boolean(true));
        assert_eq!(eval_row("name NOT LIKE 'a%'", &r).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_null_three_valued_logic() {
        let r = row("Cici", None, 2.0);
        assert_eq!(eval_row("age > 18", &r).unwrap(), Value::Null);
        assert_eq!(eval_row("age > 18 AND false", &r).unwrap(), Value::Boolean(false));
        assert_eq!(eval_row("age > 18 OR true", &r).unwrap(), Value::Boolean(true));
        assert_eq!(eval_row("age IS NULL", &r).unwrap(), Value::Boolean(true));
        assert_eq!(eval_row("coalesce(age, 0)", &r).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_arithmetic() {
        let r = row("Ana", Some(21), 3.5);
        assert_eq!(eval_row("age + 1", &r).unwrap(), Value::Integer(22));
        assert_eq!(eval_row("age * score", &r).unwrap(), Value::Float(73.5));
        assert_eq!(eval_row("age / 2", &r).unwrap(), Value::Float(10.5));
        assert_eq!(eval_row("age % 4", &r).unwrap(), Value::Integer(1));
        assert_eq!(eval_row("age / 0", &r).unwrap(), Value::Null);
        assert!(eval_row("name + 1", &r).is_err());
    }

    #[test]
    fn test_placeholders() {
        let r = row("Ana", Some(21), 3.5);
        assert_eq!(eval_row("age > :min", &r).unwrap(), Value::Boolean(true));
        let err = eval_row("age > :max", &r).unwrap_err();
        assert!(err.to_string().contains(":max"));
    }

    #[test]
    fn test_unknown_column_and_aggregate_in_where() {
        let r = row("Ana", Some(21), 3.5);
        assert!(eval_row("height > 1", &r).is_err());
        assert!(eval_row("count(*) > 1", &r).is_err());
        assert!(eval_row("name > 1", &r).is_err());
    }

    #[test]
    fn test_group_aggregates() {
        let schema = schema();
        let bindings = BTreeMap::new();
        let a = row("Ana", Some(20), 3.0);
        let b = row("Budi", None, 4.0);
        let c = row("Ana", Some(30), 2.0);
        let rows = [&a, &b, &c];
        let ctx = EvalContext::group(&schema, &rows, &bindings);

        let eval = |text: &str| ctx.evaluate(&QueryParser::parse_expr(text).unwrap()).unwrap();
        assert_eq!(eval("count(*)"), Value::Integer(3));
        assert_eq!(eval("count(age)"), Value::Integer(2));
        assert_eq!(eval("count(DISTINCT name)"), Value::Integer(2));
        assert_eq!(eval("sum(age)"), Value::Integer(50));
        assert_eq!(eval("avg(score)"), Value::Float(3.0));
        assert_eq!(eval("min(name)"), Value::Text("Ana".to_string()));
        assert_eq!(eval("max(score)"), Value::Float(4.0));
        assert_eq!(eval("name"), Value::Text("Ana".to_string()));
        assert_eq!(eval("count(*) > 1"), Value::Boolean(true));
    }

    #[test]
    fn test_contains_aggregate() {
        let check = |text: &str| contains_aggregate(&QueryParser::parse_expr(text).unwrap());
        assert!(check("count(*) > 1"));
        assert!(check("upper(max(name))"));
        assert!(!check("upper(name) = 'ANA'"));
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("Jakarta", "jak%"));
        assert!(like("Jakarta", "%ART_"));
        assert!(!like("Jakarta", "_ak"));
        assert!(like("50%", "50\\%"));
        assert!(!like("500", "50\\%"));
        assert!(like("", "%"));
        assert!(!like("", "_"));
        assert!(like("a_b", "a\\_b"));
        assert!(!like("axb", "a\\_b"));
    }

    #[test]
    fn test_like_with_many_wildcards() {
        let text = "a".repeat(60);
        assert!(!like(&text, "%a%a%a%a%a%a%a%b"));
        assert!(like(&text, "%a%a%a%a%a%a%a%"));
        assert!(like(&format!("{}b", text), "%a%a%a%a%a%a%a%b"));

        let r = row(&text, Some(1), 1.0);
        assert_eq!(
            eval_row("name LIKE '%a%a%a%a%a%a%a%b'", &r).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_check_columns_against_schema() {
        let schema = schema();
        let check = |text: &str| check_columns(&QueryParser::parse_expr(text).unwrap(), &schema);
        assert!(check("upper(name) LIKE 'a%' AND age BETWEEN 1 AND 2").is_ok());
        assert!(check("count(*) > 1").is_ok());
        assert!(check("coalesce(height, 0)").is_err());
        assert!(check("age IN (1, height)").is_err());
        let err = check("score + height > 1").unwrap_err();
        assert_eq!(err.to_string(), "Unknown column 'height'");
    }
}
