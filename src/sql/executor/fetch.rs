use std::sync::Arc;

use crate::{
    sql::{
        expression::{Fetch, RowContext, SlotId},
        schema::SqlColumn,
    },
    storage::TableIterator,
};

/// Columns one table contributes to the row context, in iterator order
#[derive(Debug, Clone, Default)]
pub struct TableFetch {
    pub columns: Vec<Arc<SqlColumn>>,
    pub slots: Vec<SlotId>,
}

impl TableFetch {
    /// Picks the fetches of table `table` out of the binder's fetch list
    pub fn plan(table: usize, fetches: &[Fetch]) -> Self {
        let mut plan = Self::default();
        for (slot, fetch) in fetches.iter().enumerate() {
            if fetch.table == table {
                plan.columns.push(fetch.column.clone());
                plan.slots.push(slot);
            }
        }
        plan
    }

    /// Copies the iterator's current row into the slots
    pub fn load(&self, iter: &dyn TableIterator, ctx: &mut RowContext) {
        let data = iter.data();
        let offsets = iter.column_offsets();
        let sizes = iter.doubles_sizes();
        for (i, slot) in self.slots.iter().enumerate() {
            let (start, size) = (offsets[i], sizes[i]);
            if let Some(slot) = ctx.slots.get_mut(*slot) {
                slot.load(&data[start..start + size]);
            }
        }
    }

    /// Takes over the iterator's current missing-value metadata
    pub fn refresh(&self, iter: &dyn TableIterator, ctx: &mut RowContext) {
        let has_missing = iter.columns_have_missing();
        let missing_values = iter.missing_values();
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = ctx.slots.get_mut(*slot) {
                slot.has_missing = has_missing[i];
                slot.missing_value = missing_values[i];
            }
            tracing::debug!(
                "missing value of {} is now {:?}",
                self.columns[i].full_name(),
                has_missing[i].then_some(missing_values[i])
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TableFetch;
    use crate::{
        config::Config,
        error::Result,
        sql::{
            expression::{Binder, FunctionRegistry},
            testing,
        },
    };

    #[test]
    fn test_load() -> Result<()> {
        let db = testing::link_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![db.table("a")?, db.table("b")?]);
        binder.column("bval", None)?;
        binder.column("aval", None)?;

        let fetch = TableFetch::plan(0, binder.fetches());
        assert_eq!(fetch.slots, vec![1]);
        assert_eq!(fetch.columns[0].full_name(), "aval@a");

        let mut ctx = binder.context();
        let mut iter = db.table("a")?.iterator(&fetch.columns)?;
        assert!(iter.next()?);
        fetch.load(&*iter, &mut ctx);
        assert_eq!(ctx.slots[1].number(), Some(1.0));
        Ok(())
    }
}
