//! Parameterised statements and the row-level statements issued on save.

use std::fmt;

use crate::entity::Entity;
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// A SQL statement with positional (`$n`) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Bound parameters.
    pub params: Vec<Value>,
}

impl Statement {
    /// Create a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a statement with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

/// Quote an identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render `INSERT INTO ... VALUES (...)` for every column of the entity.
pub fn insert_statement(entity: &dyn Entity) -> QueryResult<Statement> {
    let values = entity.values();
    if values.is_empty() {
        return Err(QueryError::nothing_to_write(entity.type_name()));
    }

    let columns: Vec<String> = values.iter().map(|(c, _)| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("${}", i)).collect();

    Ok(Statement::with_params(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(entity.table_name()),
            columns.join(", "),
            placeholders.join(", ")
        ),
        values.into_iter().map(|(_, v)| v).collect(),
    ))
}

/// Render a full-row `UPDATE ... WHERE <pk>` for the entity.
pub fn update_statement(entity: &dyn Entity) -> QueryResult<Statement> {
    let (key_columns, key_values) = key_parts(entity)?;
    let pk = entity.primary_key();

    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for (column, value) in entity.values() {
        if pk.contains(&column) {
            continue;
        }
        params.push(value);
        assignments.push(format!("{} = ${}", quote_ident(column), params.len()));
    }
    if assignments.is_empty() {
        return Err(QueryError::nothing_to_write(entity.type_name()));
    }

    let predicate = key_predicate(&key_columns, &mut params, key_values);
    Ok(Statement::with_params(
        format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(entity.table_name()),
            assignments.join(", "),
            predicate
        ),
        params,
    ))
}

/// Render `DELETE ... WHERE <pk>` for the entity.
pub fn delete_statement(entity: &dyn Entity) -> QueryResult<Statement> {
    let (key_columns, key_values) = key_parts(entity)?;
    let mut params = Vec::new();
    let predicate = key_predicate(&key_columns, &mut params, key_values);
    Ok(Statement::with_params(
        format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(entity.table_name()),
            predicate
        ),
        params,
    ))
}

fn key_parts(entity: &dyn Entity) -> QueryResult<(Vec<String>, Vec<Value>)> {
    let pk = entity.primary_key();
    if pk.is_empty() {
        return Err(QueryError::missing_primary_key(entity.type_name()));
    }

    let values = entity.values();
    let mut columns = Vec::with_capacity(pk.len());
    let mut key_values = Vec::with_capacity(pk.len());
    for key in pk {
        match values.iter().find(|(c, _)| c == key) {
            Some((_, v)) if !v.is_zero() => {
                columns.push(key.to_string());
                key_values.push(v.clone());
            }
            _ => return Err(QueryError::missing_primary_key(entity.type_name())),
        }
    }
    Ok((columns, key_values))
}

fn key_predicate(columns: &[String], params: &mut Vec<Value>, key_values: Vec<Value>) -> String {
    let mut clauses = Vec::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(key_values) {
        params.push(value);
        clauses.push(format!("{} = ${}", quote_ident(column), params.len()));
    }
    clauses.join(" AND ")
}
