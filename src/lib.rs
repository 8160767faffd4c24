//! obsql - an embeddable SQL SELECT engine over columnar, double-encoded data
//!
//! This crate provides:
//! - A type system with bitfields and per-column missing values
//! - Tables joined positionally through offset/length links
//! - Expression trees with scalar, aggregate and stateful builtins
//! - A nested loop join planner with predicate push-down and implicit grouping
//! - Output sinks for plain text, DISTINCT and ORDER BY
//!
//! The SQL parser and the on-disk table formats live outside this crate: a
//! parser hands over `sql::ast` statements, a backend implements
//! `storage::TableSource`.

pub mod config;
pub mod error;
pub mod sql;
pub mod storage;

pub use config::{Config, OutputConfig};
pub use error::{Error, Result};
pub use sql::engine::Session;
