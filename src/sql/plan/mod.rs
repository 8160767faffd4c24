//! Query planning: AST to executable `Select`

mod planner;

pub use planner::SelectFactory;
