//! In-memory execution layer for tests.
//!
//! [`MemoryExecutor`] records every statement it is asked to run. Statements
//! executed inside a transaction are staged and only become visible through
//! [`MemoryExecutor::committed`] once the transaction commits. Failures can
//! be injected by position or by SQL substring.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ErrorCode, QueryError, QueryResult};
use crate::executor::{ColumnInfo, Executor, Transaction};
use crate::statement::Statement;

#[derive(Debug, Default)]
struct MemoryState {
    committed: Vec<Statement>,
    executed: usize,
    commits: usize,
    rollbacks: usize,
    fail_on: Option<usize>,
    fail_when: Option<String>,
    columns: HashMap<String, Vec<ColumnInfo>>,
}

impl MemoryState {
    fn check(&mut self, statement: &Statement) -> QueryResult<()> {
        self.executed += 1;
        if self.fail_on == Some(self.executed) {
            return Err(QueryError::database(format!(
                "injected failure on statement {}",
                self.executed
            ))
            .with_sql(statement.sql.clone()));
        }
        if let Some(needle) = &self.fail_when
            && statement.sql.contains(needle.as_str())
        {
            return Err(QueryError::database(format!("injected failure on '{}'", needle))
                .with_sql(statement.sql.clone()));
        }
        Ok(())
    }
}

/// An [`Executor`] that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryExecutor {
    /// Create an empty executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th statement (1-based) executed from now on.
    pub fn fail_on(&self, n: usize) {
        let mut state = self.state.lock();
        state.executed = 0;
        state.fail_on = Some(n);
    }

    /// Fail every statement whose SQL contains `needle`.
    pub fn fail_when(&self, needle: impl Into<String>) {
        self.state.lock().fail_when = Some(needle.into());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.fail_on = None;
        state.fail_when = None;
    }

    /// Set the columns returned when introspecting `table`.
    pub fn set_columns(&self, table: impl Into<String>, columns: Vec<ColumnInfo>) {
        self.state.lock().columns.insert(table.into(), columns);
    }

    /// Statements that have been committed, in order.
    pub fn committed(&self) -> Vec<Statement> {
        self.state.lock().committed.clone()
    }

    /// SQL text of the committed statements.
    pub fn committed_sql(&self) -> Vec<String> {
        self.state
            .lock()
            .committed
            .iter()
            .map(|s| s.sql.clone())
            .collect()
    }

    /// Number of committed transactions.
    pub fn commit_count(&self) -> usize {
        self.state.lock().commits
    }

    /// Number of rolled back transactions.
    pub fn rollback_count(&self) -> usize {
        self.state.lock().rollbacks
    }
}

#[async_trait]
impl Executor for MemoryExecutor {
    type Tx = MemoryTransaction;

    async fn execute(&self, statement: &Statement) -> QueryResult<u64> {
        let mut state = self.state.lock();
        state.check(statement)?;
        state.committed.push(statement.clone());
        Ok(1)
    }

    async fn begin_transaction(&self) -> QueryResult<MemoryTransaction> {
        Ok(MemoryTransaction {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
            closed: false,
        })
    }

    async fn introspect_columns(&self, table: &str) -> QueryResult<Vec<ColumnInfo>> {
        Ok(self
            .state
            .lock()
            .columns
            .get(table)
            .cloned()
            .unwrap_or_default())
    }
}

/// Transaction handle of [`MemoryExecutor`].
#[derive(Debug)]
pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<Statement>,
    closed: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> QueryResult<()> {
        if self.closed {
            return Err(QueryError::new(
                ErrorCode::TransactionClosed,
                "transaction already committed or rolled back",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn execute(&mut self, statement: &Statement) -> QueryResult<u64> {
        self.ensure_open()?;
        self.state.lock().check(statement)?;
        self.staged.push(statement.clone());
        Ok(1)
    }

    async fn commit(&mut self) -> QueryResult<()> {
        self.ensure_open()?;
        self.closed = true;
        let mut state = self.state.lock();
        state.committed.append(&mut self.staged);
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> QueryResult<()> {
        self.ensure_open()?;
        self.closed = true;
        self.staged.clear();
        self.state.lock().rollbacks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_publishes_statements() {
        let executor = MemoryExecutor::new();
        let mut tx = executor.begin_transaction().await.unwrap();
        tx.execute(&Statement::new("CREATE TABLE a ()")).await.unwrap();
        assert!(executor.committed().is_empty());
        tx.commit().await.unwrap();
        assert_eq!(executor.committed_sql(), vec!["CREATE TABLE a ()".to_string()]);
    }

    #[tokio::test]
    async fn test_rollback_discards_statements() {
        let executor = MemoryExecutor::new();
        let mut tx = executor.begin_transaction().await.unwrap();
        tx.execute(&Statement::new("DELETE FROM a")).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(executor.committed().is_empty());
        assert_eq!(executor.rollback_count(), 1);

        let err = tx.commit().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TransactionClosed);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let executor = MemoryExecutor::new();
        executor.fail_when("DROP");
        assert!(executor.execute(&Statement::new("DROP TABLE a")).await.is_err());
        assert!(executor.execute(&Statement::new("SELECT 1")).await.is_ok());

        executor.clear_failures();
        executor.fail_on(2);
        assert!(executor.execute(&Statement::new("SELECT 1")).await.is_ok());
        assert!(executor.execute(&Statement::new("SELECT 2")).await.is_err());
    }

    #[tokio::test]
    async fn test_introspection() {
        let executor = MemoryExecutor::new();
        executor.set_columns("users", vec![ColumnInfo::new("id", "uuid").primary()]);
        assert_eq!(executor.introspect_columns("users").await.unwrap().len(), 1);
        assert!(executor.introspect_columns("missing").await.unwrap().is_empty());
    }
}
