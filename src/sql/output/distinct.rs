use std::collections::HashSet;

use crate::{
    error::Result,
    sql::{
        output::{ColumnInfo, Output},
        types::{Value, trim},
    },
};

/// Encodes the visible cells so that values equal under `Value::cmp` share a
/// key: numbers by their double value, strings without padding
fn key(row: &[Value]) -> Result<Vec<u8>> {
    let canonical: Vec<Value> = row
        .iter()
        .map(|v| match v {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(trim(s).to_string()),
            other => other.as_f64().map_or(Value::Null, Value::Double),
        })
        .collect();
    Ok(bincode::serialize(&canonical)?)
}

/// Passes on the first occurrence of every distinct visible row
pub struct DistinctOutput<'a> {
    next: Box<dyn Output + 'a>,
    visible: usize,
    seen: HashSet<Vec<u8>>,
}

impl<'a> DistinctOutput<'a> {
    pub fn new(next: Box<dyn Output + 'a>) -> Box<Self> {
        Box::new(Self {
            next,
            visible: 0,
            seen: HashSet::new(),
        })
    }
}

impl Output for DistinctOutput<'_> {
    fn size(&self) -> usize {
        self.seen.len()
    }

    fn reset(&mut self) {
        self.seen.clear();
        self.next.reset();
    }

    fn prepare(&mut self, columns: &[ColumnInfo]) -> Result<()> {
        self.visible = columns.iter().filter(|c| !c.hidden).count();
        self.next.prepare(columns)
    }

    fn cleanup(&mut self) {
        self.next.cleanup();
    }

    fn output(&mut self, row: &[Value]) -> Result<bool> {
        if !self.seen.insert(key(&row[..self.visible.min(row.len())])?) {
            return Ok(false);
        }
        self.next.output(row)
    }

    fn flush(&mut self) -> Result<()> {
        self.next.flush()
    }

    fn count(&self) -> u64 {
        self.next.count()
    }
}
