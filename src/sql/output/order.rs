use std::cmp::Ordering;

use crate::{
    error::Result,
    sql::{
        ast::OrderDirection,
        output::{ColumnInfo, Output},
        types::{Row, Value},
    },
};

/// Buffers every row and passes them on sorted at flush time
///
/// Keys are positions in the incoming row; hidden key columns are dropped
/// before rows reach the next sink.
pub struct OrderByOutput<'a> {
    next: Box<dyn Output + 'a>,
    order_by: Vec<(usize, OrderDirection)>,
    visible: usize,
    rows: Vec<Row>,
}

impl<'a> OrderByOutput<'a> {
    pub fn new(next: Box<dyn Output + 'a>, order_by: Vec<(usize, OrderDirection)>) -> Box<Self> {
        Box::new(Self {
            next,
            order_by,
            visible: 0,
            rows: Vec::new(),
        })
    }
}

impl Output for OrderByOutput<'_> {
    fn size(&self) -> usize {
        self.rows.len()
    }

    fn reset(&mut self) {
        self.rows.clear();
        self.next.reset();
    }

    fn prepare(&mut self, columns: &[ColumnInfo]) -> Result<()> {
        let visible: Vec<ColumnInfo> = columns.iter().filter(|c| !c.hidden).cloned().collect();
        self.visible = visible.len();
        self.next.prepare(&visible)
    }

    fn cleanup(&mut self) {
        self.next.cleanup();
    }

    fn output(&mut self, row: &[Value]) -> Result<bool> {
        self.rows.push(row.to_vec());
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        // Multi-column sort: compare rows key by key, the first unequal key
        // decides, reversed for DESC. Missing values sort lowest.
        let order_by = &self.order_by;
        self.rows.sort_by(|a, b| {
            for (index, direction) in order_by {
                let (Some(x), Some(y)) = (a.get(*index), b.get(*index)) else {
                    continue;
                };
                match x.cmp(y) {
                    Ordering::Equal => {}
                    o => {
                        return if *direction == OrderDirection::Asc { o } else { o.reverse() };
                    }
                }
            }
            Ordering::Equal
        });
        for row in std::mem::take(&mut self.rows) {
            let end = self.visible.min(row.len());
            self.next.output(&row[..end])?;
        }
        self.next.flush()
    }

    fn count(&self) -> u64 {
        self.next.count()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::OrderByOutput;
    use crate::{
        error::Result,
        sql::{
            ast::OrderDirection,
            output::{CaptureOutput, Output, tests::columns},
            types::{TypeKind, Value},
        },
    };

    #[test]
    fn test_order() -> Result<()> {
        let mut capture = CaptureOutput::new();
        {
            let mut order = OrderByOutput::new(
                Box::new(&mut capture),
                vec![(1, OrderDirection::Desc), (0, OrderDirection::Asc)],
            );
            order.prepare(&columns(&[("a", TypeKind::Integer), ("k", TypeKind::Real)], 1))?;
            for (a, k) in [(3, Some(1.0)), (1, None), (2, Some(1.0)), (4, Some(5.0))] {
                let k = k.map(Value::Real).unwrap_or(Value::Null);
                order.output(&[Value::Integer(a), k])?;
            }
            assert_eq!(order.size(), 4);
            assert_eq!(order.count(), 0);
            order.flush()?;
            assert_eq!(order.count(), 4);
        }
        assert_eq!(capture.titles(), vec!["a"]);
        let got: Vec<Value> = capture.rows().iter().map(|r| r[0].clone()).collect();
        assert_eq!(got, vec![Value::Integer(4), Value::Integer(2), Value::Integer(3), Value::Integer(1)]);
        Ok(())
    }

    proptest! {
        #[test]
        fn test_order_sorted(values in proptest::collection::vec(-100i64..100, 0..50), desc in any::<bool>()) {
            let direction = if desc { OrderDirection::Desc } else { OrderDirection::Asc };
            let mut capture = CaptureOutput::new();
            {
                let mut order = OrderByOutput::new(Box::new(&mut capture), vec![(0, direction)]);
                order.prepare(&columns(&[("a", TypeKind::Integer)], 0)).unwrap();
                for v in &values {
                    order.output(&[Value::Integer(*v)]).unwrap();
                }
                order.flush().unwrap();
            }
            let got: Vec<Value> = capture.rows().iter().map(|r| r[0].clone()).collect();
            prop_assert_eq!(got.len(), values.len());
            for pair in got.windows(2) {
                if desc {
                    prop_assert!(pair[0] >= pair[1]);
                } else {
                    prop_assert!(pair[0] <= pair[1]);
                }
            }
        }
    }
}
