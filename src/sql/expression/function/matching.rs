//! `match(a, b) in (select x, y from ...)`: the subquery runs once at
//! prepare time; its sorted rows are probed by binary search.

use crate::{
    error::{Error, Result},
    sql::{
        ast::SelectStatement,
        expression::{Binder, Expression, RowContext},
        output::CaptureOutput,
        plan::SelectFactory,
        types::Row,
    },
};

/// Runs the subquery and returns its distinct rows in sorted order
pub fn materialize(subquery: &SelectStatement, width: usize, binder: &Binder) -> Result<Vec<Row>> {
    let mut capture = CaptureOutput::new();
    {
        let factory = SelectFactory::new(binder.database, binder.functions, binder.config);
        let mut select = factory.create(subquery, Box::new(&mut capture))?;
        select.execute()?;
    }
    if capture.columns().len() != width {
        return Err(Error::User(format!(
            "match compares {} values with a subquery returning {} columns",
            width,
            capture.columns().len()
        )));
    }
    let mut rows = capture.into_rows();
    rows.sort();
    rows.dedup();
    tracing::debug!("match subquery returned {} distinct rows", rows.len());
    Ok(rows)
}

/// Whether the current values of `args` form one of the rows; missing when any value is missing
pub fn contains(args: &mut [Expression], rows: &[Row], ctx: &RowContext) -> Option<f64> {
    let mut key = Vec::with_capacity(args.len());
    for arg in args {
        let value = arg.value(ctx).ok()?;
        if value.is_null() {
            return None;
        }
        key.push(value);
    }
    Some(if rows.binary_search(&key).is_ok() { 1.0 } else { 0.0 })
}
