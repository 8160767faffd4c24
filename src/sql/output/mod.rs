//! Output sinks
//!
//! The executor pushes each result row into an `Output`. Sinks decorate one
//! another: DISTINCT filters, ORDER BY buffers and sorts, and an endpoint
//! (`SimpleOutput` or `CaptureOutput`) receives the final rows.

use crate::{
    error::Result,
    sql::types::{Row, TypeRef, Value},
};

mod distinct;
mod order;
mod simple;

pub use distinct::DistinctOutput;
pub use order::OrderByOutput;
pub use simple::SimpleOutput;

/// Receives cell values by kind, see `Value::output_to`
pub trait ValueWriter {
    fn output_null(&mut self) -> Result<()>;
    fn output_int(&mut self, v: i64) -> Result<()>;
    fn output_real(&mut self, v: f64) -> Result<()>;
    fn output_double(&mut self, v: f64) -> Result<()>;
    fn output_string(&mut self, v: &str) -> Result<()>;
    fn output_bitfield(&mut self, v: u64) -> Result<()>;
}

/// Description of one output column
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub title: String,
    pub ty: TypeRef,
    /// ORDER BY key that is not part of the select list
    pub hidden: bool,
}

/// Row sink
pub trait Output {
    /// Rows held back, not yet passed on
    fn size(&self) -> usize {
        0
    }

    fn reset(&mut self);

    /// Called at the start of every execution with the row layout
    fn prepare(&mut self, columns: &[ColumnInfo]) -> Result<()>;

    fn cleanup(&mut self) {}

    /// Accepts one row; returns whether it was passed on
    fn output(&mut self, row: &[Value]) -> Result<bool>;

    fn flush(&mut self) -> Result<()>;

    /// Rows delivered to the endpoint since the last reset
    fn count(&self) -> u64;
}

impl<T: Output + ?Sized> Output for &mut T {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn prepare(&mut self, columns: &[ColumnInfo]) -> Result<()> {
        (**self).prepare(columns)
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }

    fn output(&mut self, row: &[Value]) -> Result<bool> {
        (**self).output(row)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn count(&self) -> u64 {
        (**self).count()
    }
}

impl<T: Output + ?Sized> Output for Box<T> {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn prepare(&mut self, columns: &[ColumnInfo]) -> Result<()> {
        (**self).prepare(columns)
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }

    fn output(&mut self, row: &[Value]) -> Result<bool> {
        (**self).output(row)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn count(&self) -> u64 {
        (**self).count()
    }
}

/// Keeps the column titles and rows in memory
#[derive(Debug, Default)]
pub struct CaptureOutput {
    columns: Vec<ColumnInfo>,
    rows: Vec<Row>,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn titles(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.title.clone()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl Output for CaptureOutput {
    fn reset(&mut self) {
        self.rows.clear();
    }

    fn prepare(&mut self, columns: &[ColumnInfo]) -> Result<()> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn output(&mut self, row: &[Value]) -> Result<bool> {
        self.rows.push(row.to_vec());
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn count(&self) -> u64 {
        self.rows.len() as u64
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::{CaptureOutput, ColumnInfo, Output};
    use crate::{
        error::Result,
        sql::types::{SqlType, TypeKind, Value},
    };

    pub fn columns(titles: &[(&str, TypeKind)], hidden: usize) -> Vec<ColumnInfo> {
        let n = titles.len();
        titles
            .iter()
            .enumerate()
            .map(|(i, (title, kind))| ColumnInfo {
                title: title.to_string(),
                ty: Arc::new(SqlType::new(&kind_name(*kind), 1, *kind)),
                hidden: i >= n - hidden,
            })
            .collect()
    }

    fn kind_name(kind: TypeKind) -> String {
        format!("{:?}", kind).to_lowercase()
    }

    #[test]
    fn test_capture() -> Result<()> {
        let mut capture = CaptureOutput::new();
        {
            let mut sink: Box<dyn Output + '_> = Box::new(&mut capture);
            sink.prepare(&columns(&[("a", TypeKind::Integer)], 0))?;
            assert!(sink.output(&[Value::Integer(1)])?);
            sink.flush()?;
            assert_eq!(sink.count(), 1);
        }
        assert_eq!(capture.titles(), vec!["a"]);
        assert_eq!(capture.rows(), &[vec![Value::Integer(1)]]);
        Ok(())
    }
}
