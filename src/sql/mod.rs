//! SQL processing module
//!
//! This module provides:
//! - `types`: SQL data types and values
//! - `schema`: Table and column schema definitions
//! - `database`: Table registry, variables and implicit tables
//! - `ast`: Statements handed over by a parser
//! - `expression`: Expression trees and builtin functions
//! - `plan`: Turns statements into executable selects
//! - `executor`: Join, filter and aggregation
//! - `output`: Row sinks
//! - `engine`: Sessions

pub mod ast;
pub mod database;
pub mod engine;
pub mod executor;
pub mod expression;
pub mod output;
pub mod plan;
pub mod schema;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
