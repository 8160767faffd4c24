use std::collections::BTreeSet;

use crate::{
    error::Result,
    sql::{
        executor::fetch::TableFetch,
        expression::{Expression, RowContext},
        schema::Table,
    },
    storage::TableIterator,
};

/// Window of a link target, read from the source table's current row
#[derive(Debug, Clone)]
pub struct Link {
    /// Binder index of the source table
    pub source: usize,
    pub offset: Expression,
    pub length: Expression,
}

/// One level of the nested loop join
pub struct SelectOneTable<'a> {
    pub table: &'a Table,
    /// Binder index of the table
    pub index: usize,
    pub fetch: TableFetch,
    /// Conjuncts evaluated as soon as this level has a row
    pub checks: Vec<Expression>,
    pub link: Option<Link>,
}

impl<'a> SelectOneTable<'a> {
    pub fn new(index: usize, table: &'a Table, fetch: TableFetch) -> Self {
        Self {
            table,
            index,
            fetch,
            checks: Vec::new(),
            link: None,
        }
    }

    /// Positions the iterator before the first row of this level, inside the
    /// link window when the table is a link target
    pub fn start(&mut self, iter: &mut dyn TableIterator, ctx: &RowContext) -> Result<()> {
        iter.rewind()?;
        let Some(link) = &mut self.link else {
            return Ok(());
        };
        match (link.offset.eval(ctx), link.length.eval(ctx)) {
            (Some(offset), Some(length)) if offset >= 0.0 && length >= 0.0 => {
                iter.restrict(offset as usize, length as usize)
            }
            _ => iter.restrict(0, 0),
        }
    }

    /// Whether every check of this level holds for the current row
    pub fn accept(&mut self, ctx: &RowContext) -> bool {
        self.checks
            .iter_mut()
            .all(|check| matches!(check.eval(ctx), Some(v) if v != 0.0))
    }
}

/// Sorts the join levels by database and table name, then moves every link
/// target behind its source so the window is known when the target starts
pub fn order_tables(mut pending: Vec<SelectOneTable<'_>>) -> Vec<SelectOneTable<'_>> {
    pending.sort_by(|a, b| {
        (a.table.database(), a.table.name()).cmp(&(b.table.database(), b.table.name()))
    });

    let mut ordered: Vec<SelectOneTable> = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = |t: &SelectOneTable| match &t.link {
            Some(link) => ordered.iter().any(|o| o.index == link.source),
            None => true,
        };
        let next = match pending.iter().position(ready) {
            Some(i) => pending.remove(i),
            None => {
                // link cycle: scan the first table in full
                let mut table = pending.remove(0);
                tracing::warn!("link cycle through table {}, reading it in full", table.table.name());
                table.link = None;
                table
            }
        };
        ordered.push(next);
    }
    ordered
}

/// Hands every conjunct to the first level where all the tables it reads
/// are available; conjuncts reading no table go to the innermost level.
/// Returns the conjuncts that found no level, which only happens without tables.
pub fn assign_checks(plan: &mut [SelectOneTable<'_>], conjuncts: Vec<Expression>) -> Vec<Expression> {
    let Some(last) = plan.len().checked_sub(1) else {
        return conjuncts;
    };
    for conjunct in conjuncts {
        let mut tables = BTreeSet::new();
        conjunct.tables(&mut tables);
        let level = if tables.is_empty() {
            last
        } else {
            let mut introduced = BTreeSet::new();
            plan.iter()
                .position(|t| {
                    introduced.insert(t.index);
                    tables.is_subset(&introduced)
                })
                .unwrap_or(last)
        };
        tracing::debug!("check {} runs on table {}", conjunct, plan[level].table.name());
        plan[level].checks.push(conjunct);
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::{Link, SelectOneTable, assign_checks, order_tables};
    use crate::{
        config::Config,
        error::Result,
        sql::{
            executor::fetch::TableFetch,
            expression::{Binder, Expression, FunctionRegistry},
            testing,
        },
    };

    #[test]
    fn test_order_links_last() -> Result<()> {
        let db = testing::link_example()?;
        let (a, b) = (db.table("a")?, db.table("b")?);
        let mut target = SelectOneTable::new(0, b, TableFetch::default());
        target.link = Some(Link {
            source: 1,
            offset: Expression::number(0.0),
            length: Expression::number(1.0),
        });
        let source = SelectOneTable::new(1, a, TableFetch::default());

        let ordered = order_tables(vec![target, source]);
        let names: Vec<&str> = ordered.iter().map(|t| t.table.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn test_link_cycle() -> Result<()> {
        let db = testing::link_example()?;
        let mut b = SelectOneTable::new(0, db.table("b")?, TableFetch::default());
        b.link = Some(Link {
            source: 7,
            offset: Expression::number(0.0),
            length: Expression::number(1.0),
        });
        let ordered = order_tables(vec![b]);
        assert!(ordered[0].link.is_none());
        Ok(())
    }

    #[test]
    fn test_assign_checks() -> Result<()> {
        let db = testing::link_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![db.table("a")?, db.table("b")?]);

        let mut conjuncts = vec![
            functions.build(">", vec![Expression::column("bval"), Expression::number(1.0)])?,
            functions.build("<", vec![Expression::column("aval"), Expression::column("bval")])?,
            functions.build(">", vec![Expression::column("aval"), Expression::number(0.0)])?,
            functions.build("rownumber", vec![])?,
        ];
        for conjunct in &mut conjuncts {
            conjunct.prepare(&mut binder)?;
        }
        let (tables, fetches) = binder.into_parts();
        let mut plan: Vec<SelectOneTable> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| SelectOneTable::new(i, t, TableFetch::plan(i, &fetches)))
            .collect();

        assert!(assign_checks(&mut plan, conjuncts).is_empty());
        let a: Vec<String> = plan[0].checks.iter().map(|c| c.to_string()).collect();
        let b: Vec<String> = plan[1].checks.iter().map(|c| c.to_string()).collect();
        assert_eq!(a, vec!["(aval > 0)"]);
        assert_eq!(b, vec!["(bval > 1)", "(aval < bval)", "rownumber()"]);
        Ok(())
    }
}
