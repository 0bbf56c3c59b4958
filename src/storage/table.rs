// Table implementation
// A table combines a schema with its rows; row IDs are insertion positions

use super::{Row, Schema, Value};
use anyhow::{anyhow, Result};

/// Represents a database table
pub struct Table {
    /// The name of the table
    pub name: String,
    /// The schema (column definitions)
    pub schema: Schema,
    /// Rows in insertion order; the index is the row ID the lock table uses
    rows: Vec<Row>,
}

impl Table {
    /// Create a new, empty table with the given name and schema
    pub fn new(name: String, schema: Schema) -> Self {
        Self {
            name,
            schema,
            rows: Vec::new(),
        }
    }

    /// Insert a row into the table
    /// Returns the row ID of the inserted row
    pub fn insert(&mut self, values: Vec<Value>) -> Result<usize> {
        // Validate the row matches the schema
        if values.len() != self.schema.columns.len() {
            return Err(anyhow!(
                "Expected {} values, got {}",
                self.schema.columns.len(),
                values.len()
            ));
        }

        for (column, value) in self.schema.columns.iter().zip(&values) {
            if value.is_null() && !column.nullable {
                return Err(anyhow!("Column '{}' cannot be NULL", column.name));
            }
            if !column.data_type.accepts(value) {
                return Err(anyhow!(
                    "Value {} does not fit column '{}' of type {:?}",
                    value.to_sql_literal(),
                    column.name,
                    column.data_type
                ));
            }
        }

        // Check primary key constraint (no duplicates)
        if let Some(pk_index) = self.schema.get_primary_key_index() {
            let pk_value = &values[pk_index];
            if self.rows.iter().any(|row| &row.values[pk_index] == pk_value) {
                return Err(anyhow!("Primary key violation: duplicate value"));
            }
        }

        let row_id = self.rows.len();
        self.rows.push(Row::new(values));
        Ok(row_id)
    }

    /// Get a row by ID
    pub fn get(&self, row_id: usize) -> Option<&Row> {
        self.rows.get(row_id)
    }

    /// Full table scan in insertion order, paired with row IDs
    pub fn scan(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.rows.iter().enumerate()
    }

    /// Get the number of rows in the table
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the schema of the table
    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }
}
