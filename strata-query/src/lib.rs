//! # strata-query
//!
//! Execution-layer contracts and the unit-of-work change tracker for the
//! Strata ORM.
//!
//! - [`Executor`] / [`Transaction`]: what Strata needs from a database driver
//! - [`Statement`] and [`Value`]: parameterised SQL with `$n` placeholders
//! - [`ChangeTracker`]: entity identity, lifecycle state and atomic saves
//! - [`testing::MemoryExecutor`]: an in-memory executor for tests
//!
//! ## Tracking changes
//!
//! ```rust
//! use strata_query::{ChangeTracker, Entity, EntityState, Value};
//!
//! struct Post {
//!     id: i64,
//!     title: String,
//! }
//!
//! impl Entity for Post {
//!     fn type_name(&self) -> &str { "Post" }
//!     fn table_name(&self) -> &str { "posts" }
//!     fn primary_key(&self) -> &[&str] { &["id"] }
//!     fn values(&self) -> Vec<(&str, Value)> {
//!         vec![("id", Value::Int(self.id)), ("title", Value::from(self.title.as_str()))]
//!     }
//! }
//!
//! let tracker = ChangeTracker::new();
//! let key = tracker.add(Post { id: 1, title: "Hello".into() });
//! assert_eq!(key.as_str(), "Post:1");
//! assert_eq!(tracker.state_of(&key), Some(EntityState::Added));
//! ```

pub mod entity;
pub mod error;
pub mod executor;
pub mod identity;
pub mod logging;
pub mod statement;
pub mod testing;
pub mod tracker;
pub mod value;

pub use entity::Entity;
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult};
pub use executor::{ColumnInfo, Executor, Transaction};
pub use identity::{EntityKey, IdentityStrategy, StructuralIdentity};
pub use statement::{Statement, quote_ident};
pub use tracker::{ChangeTracker, EntityState, SaveResult, TrackedEntry};
pub use value::Value;
