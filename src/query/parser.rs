// SQL Parser
// This module turns text into structures the executor can run:
// - loader statements (CREATE TABLE, INSERT) used to fill tables
// - the string fragments of a QuerySpec (predicate, grouping, having,
//   sort fields) and the projection list, compiled into expression trees
// We use the sqlparser crate to handle the SQL grammar

use crate::spec::QuerySpec;
use crate::storage::{Column, DataType, Schema, Value};
use anyhow::{anyhow, Context, Result};
use sqlparser::ast::{
    DataType as SqlDataType, Expr, SelectItem, SetExpr, Statement as SqlStatement,
    UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

/// Loader statements
#[derive(Debug)]
pub enum Statement {
    /// CREATE TABLE tablename (col1 TYPE, col2 TYPE, ...)
    CreateTable { name: String, schema: Schema },
    /// INSERT INTO tablename VALUES (val1, ...), (val1, ...)
    Insert {
        table_name: String,
        rows: Vec<Vec<Value>>,
    },
}

/// One ORDER BY entry
#[derive(Debug, Clone)]
pub struct SortField {
    pub expr: Expr,
    pub descending: bool,
}

/// One entry of the select list
#[derive(Debug, Clone)]
pub enum Projection {
    /// `*` - every column of the table, in schema order
    AllColumns,
    /// An expression with the name it is reported under
    Expr { expr: Expr, name: String },
}

/// A QuerySpec with every fragment parsed
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub predicate: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<SortField>,
    pub projection: Vec<Projection>,
}

/// The query parser
pub struct QueryParser;

impl QueryParser {
    /// Parse a single loader statement
    pub fn parse(sql: &str) -> Result<Statement> {
        let mut statements = Self::parse_script(sql)?;
        if statements.len() != 1 {
            return Err(anyhow!("Only single statements are supported"));
        }
        Ok(statements.remove(0))
    }

    /// Parse a `;`-separated script of loader statements
    pub fn parse_script(sql: &str) -> Result<Vec<Statement>> {
        let dialect = GenericDialect {};
        let ast = Parser::parse_sql(&dialect, sql)
            .map_err(|e| anyhow!("SQL parsing error: {}", e))?;

        ast.iter()
            .map(|statement| match statement {
                SqlStatement::CreateTable(create_table) => {
                    Self::parse_create_table(create_table)
                }
                SqlStatement::Insert(insert) => Self::parse_insert(insert),
                _ => Err(anyhow!("Unsupported SQL statement: {}", statement)),
            })
            .collect()
    }

    /// Compile every fragment of a resolved spec plus the select list
    /// An empty `fields` list selects every column
    pub fn compile(spec: &QuerySpec, fields: &[&str]) -> Result<CompiledQuery> {
        let predicate = spec
            .predicate()
            .map(|p| Self::parse_expr(p).context("in WHERE"))
            .transpose()?;

        let group_by = spec
            .group_by()
            .iter()
            .map(|g| Self::parse_expr(g).context("in GROUP BY"))
            .collect::<Result<Vec<_>>>()?;

        let having = spec
            .having()
            .map(|h| Self::parse_expr(h).context("in HAVING"))
            .transpose()?;

        let order_by = spec
            .order_by()
            .iter()
            .map(|o| Self::parse_sort_field(o).context("in ORDER BY"))
            .collect::<Result<Vec<_>>>()?;

        let projection = Self::parse_projection(fields).context("in select list")?;

        Ok(CompiledQuery {
            predicate,
            group_by,
            having,
            order_by,
            projection,
        })
    }

    /// Parse one standalone expression; trailing input is an error
    pub fn parse_expr(text: &str) -> Result<Expr> {
        let text = rewrite_named_placeholders(text);
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(&text)
            .map_err(|e| anyhow!("SQL parsing error: {}", e))?;

        let expr = parser
            .parse_expr()
            .map_err(|e| anyhow!("Invalid expression '{}': {}", text, e))?;
        parser
            .expect_token(&Token::EOF)
            .map_err(|e| anyhow!("Unexpected input after expression '{}': {}", expr, e))?;

        Ok(expr)
    }

    /// Parse `expr [ASC|DESC]`
    pub fn parse_sort_field(text: &str) -> Result<SortField> {
        let text = rewrite_named_placeholders(text);
        let dialect = GenericDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(&text)
            .map_err(|e| anyhow!("SQL parsing error: {}", e))?;

        let expr = parser
            .parse_expr()
            .map_err(|e| anyhow!("Invalid sort expression '{}': {}", text, e))?;
        let descending = if parser.parse_keyword(Keyword::DESC) {
            true
        } else {
            parser.parse_keyword(Keyword::ASC);
            false
        };
        parser
            .expect_token(&Token::EOF)
            .map_err(|e| anyhow!("Unexpected input after sort field '{}': {}", expr, e))?;

        Ok(SortField { expr, descending })
    }

    /// Parse a select list (`expr [AS alias]` items)
    pub fn parse_projection(fields: &[&str]) -> Result<Vec<Projection>> {
        if fields.is_empty() {
            return Ok(vec![Projection::AllColumns]);
        }

        let sql = format!(
            "SELECT {} FROM projection",
            rewrite_named_placeholders(&fields.join(", "))
        );
        let dialect = GenericDialect {};
        let ast = Parser::parse_sql(&dialect, &sql)
            .map_err(|e| anyhow!("SQL parsing error: {}", e))?;

        let select = match ast.as_slice() {
            [SqlStatement::Query(query)] => match query.body.as_ref() {
                SetExpr::Select(select) => select,
                _ => return Err(anyhow!("Unsupported select list")),
            },
            _ => return Err(anyhow!("Unsupported select list")),
        };
        if select.selection.is_some() || select.from.len() != 1 {
            return Err(anyhow!("Unexpected clause in select list"));
        }

        select
            .projection
            .iter()
            .map(|item| match item {
                SelectItem::Wildcard(_) => Ok(Projection::AllColumns),
                SelectItem::UnnamedExpr(expr) => Ok(Projection::Expr {
                    name: expr_name(expr),
                    expr: expr.clone(),
                }),
                SelectItem::ExprWithAlias { expr, alias } => Ok(Projection::Expr {
                    expr: expr.clone(),
                    name: alias.value.clone(),
                }),
                _ => Err(anyhow!("Unsupported select item: {}", item)),
            })
            .collect()
    }

    /// Parse CREATE TABLE statement
    fn parse_create_table(create_table: &sqlparser::ast::CreateTable) -> Result<Statement> {
        let table_name = create_table.name.to_string();
        let mut columns = Vec::new();

        for column_def in &create_table.columns {
            let data_type = Self::parse_data_type(&column_def.data_type)?;

            let primary_key = column_def.options.iter().any(|opt| {
                matches!(
                    opt.option,
                    sqlparser::ast::ColumnOption::Unique {
                        is_primary: true,
                        ..
                    }
                )
            });

            let nullable = !primary_key
                && !column_def
                    .options
                    .iter()
                    .any(|opt| matches!(opt.option, sqlparser::ast::ColumnOption::NotNull));

            columns.push(Column {
                name: column_def.name.value.clone(),
                data_type,
                primary_key,
                nullable,
            });
        }

        Ok(Statement::CreateTable {
            name: table_name,
            schema: Schema::new(columns),
        })
    }

    /// Parse INSERT statement (one or more VALUES rows)
    fn parse_insert(insert: &sqlparser::ast::Insert) -> Result<Statement> {
        let table_name = match &insert.table_name {
            sqlparser::ast::ObjectName(idents) => idents
                .iter()
                .map(|i| i.value.clone())
                .collect::<Vec<_>>()
                .join("."),
        };

        let rows = match &insert.source {
            Some(source) => match source.body.as_ref() {
                SetExpr::Values(values) => {
                    if values.rows.is_empty() {
                        return Err(anyhow!("No values provided"));
                    }
                    values
                        .rows
                        .iter()
                        .map(|row| row.iter().map(Self::parse_value).collect())
                        .collect::<Result<Vec<_>>>()?
                }
                _ => return Err(anyhow!("Unsupported INSERT format")),
            },
            None => return Err(anyhow!("No values provided")),
        };

        Ok(Statement::Insert { table_name, rows })
    }

    /// Helper: Parse data type
    fn parse_data_type(sql_type: &SqlDataType) -> Result<DataType> {
        match sql_type {
            SqlDataType::Int(_) | SqlDataType::Integer(_) | SqlDataType::BigInt(_) => {
                Ok(DataType::Integer)
            }
            SqlDataType::Float(_) | SqlDataType::Double | SqlDataType::Real => {
                Ok(DataType::Float)
            }
            SqlDataType::Text
            | SqlDataType::Varchar(_)
            | SqlDataType::Char(_)
            | SqlDataType::String(_) => Ok(DataType::Text),
            SqlDataType::Boolean | SqlDataType::Bool => Ok(DataType::Boolean),
            _ => Err(anyhow!("Unsupported data type: {}", sql_type)),
        }
    }

    /// Helper: Parse a literal in a VALUES row
    fn parse_value(expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => parse_number(n),
            Expr::Value(SqlValue::SingleQuotedString(s))
            | Expr::Value(SqlValue::DoubleQuotedString(s)) => Ok(Value::Text(s.clone())),
            Expr::Value(SqlValue::Boolean(b)) => Ok(Value::Boolean(*b)),
            Expr::Value(SqlValue::Null) => Ok(Value::Null),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match Self::parse_value(expr)? {
                Value::Integer(i) => Ok(Value::Integer(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(anyhow!("Cannot negate {}", other.to_sql_literal())),
            },
            _ => Err(anyhow!("Unsupported value expression: {}", expr)),
        }
    }
}

/// Parse a numeric literal as an integer when it has no fraction or exponent
pub(crate) fn parse_number(n: &str) -> Result<Value> {
    if n.contains(['.', 'e', 'E']) {
        Ok(Value::Float(n.parse()?))
    } else {
        Ok(Value::Integer(n.parse()?))
    }
}

/// Name a select item is reported under when it has no alias
fn expr_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Rewrite `:name` placeholders to `$name` outside of quoted text.
/// The generic dialect tokenizes `$name` as a placeholder; `::` casts are left alone.
fn rewrite_named_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
            None if c == ':' && prev != Some(':') => {
                if let Some(&next) = chars.peek() {
                    if next.is_ascii_alphabetic() || next == '_' {
                        out.push('$');
                        prev = Some(c);
                        continue;
                    }
                }
            }
            None => {}
        }
        out.push(c);
        prev = Some(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::QuerySpecBuilder;

    #[test]
    fn test_parse_create_table_and_insert_script() {
        let statements = QueryParser::parse_script(
            "CREATE TABLE mhs (NIM VARCHAR(10) PRIMARY KEY, NAMA TEXT NOT NULL, IPK FLOAT); \
             INSERT INTO mhs VALUES ('A1', 'Ardina', 3.5), ('A2', 'Budi', -1)",
        )
        .unwrap();
        assert_eq!(statements.len(), 2);

        match &statements[0] {
            Statement::CreateTable { name, schema } => {
                assert_eq!(name, "mhs");
                assert_eq!(schema.column_names(), vec!["NIM", "NAMA", "IPK"]);
                assert!(schema.columns[0].primary_key);
                assert!(!schema.columns[1].nullable);
                assert_eq!(schema.columns[2].data_type, DataType::Float);
            }
            other => panic!("unexpected statement: {:?}", other),
        }

        match &statements[1] {
            Statement::Insert { table_name, rows } => {
                assert_eq!(table_name, "mhs");
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0][2], Value::Float(3.5));
                assert_eq!(rows[1][2], Value::Integer(-1));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_queries_as_loader_statements() {
        assert!(QueryParser::parse("SELECT * FROM mhs").is_err());
        assert!(QueryParser::parse("CREATE TABLE a (x INT); CREATE TABLE b (y INT)").is_err());
    }

    #[test]
    fn test_parse_expr_rejects_trailing_clauses() {
        assert!(QueryParser::parse_expr("age > 18").is_ok());
        assert!(QueryParser::parse_expr("age > 18 ORDER BY name").is_err());
        assert!(QueryParser::parse_expr("1; DROP TABLE mhs").is_err());
        assert!(QueryParser::parse_expr("age >").is_err());
    }

    #[test]
    fn test_parse_sort_field_direction() {
        assert!(QueryParser::parse_sort_field("name DESC").unwrap().descending);
        assert!(!QueryParser::parse_sort_field("name asc").unwrap().descending);
        assert!(!QueryParser::parse_sort_field("age + 1").unwrap().descending);
        assert!(QueryParser::parse_sort_field("name DESC LIMIT 1").is_err());
    }

    #[test]
    fn test_parse_projection_names() {
        let items =
            QueryParser::parse_projection(&["NAMA", "count(*) AS total", "*", "NIM + 1"]).unwrap();
        let names: Vec<String> = items
            .iter()
            .map(|p| match p {
                Projection::AllColumns => "*".to_string(),
                Projection::Expr { name, .. } => name.clone(),
            })
            .collect();
        assert_eq!(names, vec!["NAMA", "total", "*", "NIM + 1"]);

        assert!(matches!(
            QueryParser::parse_projection(&[]).unwrap().as_slice(),
            [Projection::AllColumns]
        ));
    }

    #[test]
    fn test_named_placeholders_rewritten_outside_quotes() {
        assert_eq!(
            rewrite_named_placeholders("age > :min AND name = ':min' AND x::text = :_y"),
            "age > $min AND name = ':min' AND x::text = $_y"
        );
    }

    #[test]
    fn test_compile_reports_failing_clause() {
        let mut builder = QuerySpecBuilder::new();
        builder.r#where("age > 18").order_by(["name", "age DESC"]);
        let compiled = QueryParser::compile(&builder.resolve().unwrap(), &[]).unwrap();
        assert!(compiled.predicate.is_some());
        assert_eq!(compiled.order_by.len(), 2);
        assert!(compiled.order_by[1].descending);

        builder.group_by(["dept"]).having("count(* > 1");
        let err = QueryParser::compile(&builder.resolve().unwrap(), &[]).unwrap_err();
        assert!(format!("{:#}", err).contains("in HAVING"));
    }
}
