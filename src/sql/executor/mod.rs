//! SELECT execution
//!
//! `Select` joins its tables with a nested loop kept on an explicit stack of
//! frames, one per table. Conjuncts of the WHERE clause run at the first
//! frame that has all the tables they read, and link targets only scan the
//! window addressed by the current row of their source.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    config::Config,
    error::Result,
    sql::{
        database::Database,
        expression::{Binder, ColumnExpression, Expression, FunctionRegistry, RowContext},
        output::{ColumnInfo, Output},
        schema::Table,
        types::{Row, Value},
    },
    storage::TableIterator,
};

mod fetch;
mod join;

use join::{Link, SelectOneTable, assign_checks, order_tables};

/// What a query is resolved and executed against
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub database: &'a Database,
    pub functions: &'a FunctionRegistry,
    pub config: &'a Config,
}

/// Aggregates of one group, with the hidden sort keys of its first row
struct Group {
    aggregates: Vec<Expression>,
    hidden: Row,
}

/// A planned SELECT, executable any number of times
pub struct Select<'a> {
    env: Environment<'a>,
    tables: Vec<&'a Table>,
    select: Vec<Expression>,
    /// Trailing select items that are ORDER BY keys only
    hidden: usize,
    where_clause: Option<Expression>,
    output: Box<dyn Output + 'a>,

    plan: Vec<SelectOneTable<'a>>,
    iterators: Vec<Box<dyn TableIterator + 'a>>,
    residual: Vec<Expression>,
    ctx: RowContext,
    aggregated: Vec<bool>,
    aggregate: bool,
    mixed: bool,
    groups: BTreeMap<Row, Group>,
    always_false: bool,
    total: u64,
    skips: u64,
}

impl<'a> Select<'a> {
    pub fn new(
        env: Environment<'a>,
        tables: Vec<&'a Table>,
        select: Vec<Expression>,
        hidden: usize,
        where_clause: Option<Expression>,
        output: Box<dyn Output + 'a>,
    ) -> Self {
        Self {
            env,
            tables,
            select,
            hidden,
            where_clause,
            output,
            plan: Vec::new(),
            iterators: Vec::new(),
            residual: Vec::new(),
            ctx: RowContext::default(),
            aggregated: Vec::new(),
            aggregate: false,
            mixed: false,
            groups: BTreeMap::new(),
            always_false: false,
            total: 0,
            skips: 0,
        }
    }

    /// Titles of the visible select items
    pub fn titles(&self) -> Vec<String> {
        let visible = self.select.len() - self.hidden;
        self.select[..visible].iter().map(|e| e.title()).collect()
    }

    pub fn tables(&self) -> &[&'a Table] {
        &self.tables
    }

    /// Runs the query into its output; returns the number of rows the
    /// endpoint received
    pub fn execute(&mut self) -> Result<u64> {
        self.reset();
        self.output.reset();
        let result = self
            .prepare_execute()
            .and_then(|_| self.process())
            .and_then(|_| self.post_execute());
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn reset(&mut self) {
        for expr in &mut self.select {
            expr.cleanup();
        }
        self.plan.clear();
        self.iterators.clear();
        self.residual.clear();
        self.ctx = RowContext::default();
        self.aggregated.clear();
        self.aggregate = false;
        self.mixed = false;
        self.groups.clear();
        self.always_false = false;
        self.total = 0;
        self.skips = 0;
    }

    fn prepare_execute(&mut self) -> Result<()> {
        let env = self.env;
        let mut binder = Binder::new(env.database, env.functions, env.config, self.tables.clone());

        for expr in &mut self.select {
            expr.prepare(&mut binder)?;
            tracing::debug!("select item {} of type {}", expr, expr.sql_type()?.name);
        }
        let visible = self.select.len() - self.hidden;
        self.aggregated = self.select.iter().map(|e| e.is_aggregate()).collect();
        self.aggregate = self.aggregated.iter().any(|a| *a);
        // hidden sort keys never group
        self.mixed = self.aggregate && !self.aggregated[..visible].iter().all(|a| *a);
        let columns = self
            .select
            .iter()
            .enumerate()
            .map(|(i, e)| {
                Ok(ColumnInfo {
                    title: e.title(),
                    ty: e.sql_type()?,
                    hidden: i >= visible,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.output.prepare(&columns)?;

        let conjuncts = match self.where_clause.clone() {
            Some(mut clause) => {
                clause.prepare(&mut binder)?;
                let mut changed = true;
                while changed {
                    changed = false;
                    if let Some(simplified) = clause.simplify(&mut changed)? {
                        clause = simplified;
                    }
                }
                tracing::debug!("WHERE {}", clause);
                if clause.is_constant() {
                    match clause.eval(&RowContext::default()) {
                        Some(v) if v != 0.0 => tracing::debug!("WHERE clause is always true"),
                        _ => {
                            tracing::debug!("WHERE clause is always false");
                            self.always_false = true;
                        }
                    }
                    Vec::new()
                } else {
                    clause.and_split()
                }
            }
            None => Vec::new(),
        };

        let mut used: BTreeSet<usize> = binder.fetches().iter().map(|f| f.table).collect();
        if used.is_empty() {
            used = (0..binder.tables().len()).collect();
        }

        let mut links: BTreeMap<usize, Link> = BTreeMap::new();
        for &source in &used {
            for &target in &used {
                let (from, to) = (binder.tables()[source], binder.tables()[target]);
                if source == target || !from.has_link_to(to.name()) {
                    continue;
                }
                if let Some(existing) = links.get(&target) {
                    tracing::warn!(
                        "ignoring link {} -> {}, using {} -> {}",
                        from.name(),
                        to.name(),
                        binder.tables()[existing.source].name(),
                        to.name()
                    );
                    continue;
                }
                tracing::debug!("using link {} -> {}", from.name(), to.name());
                let mut window = ["offset", "length"].map(|part| {
                    let mut column = ColumnExpression::new(&format!("{}.{}", to.name(), part), None);
                    column.table = Some(from.name().to_string());
                    Expression::Column(column)
                });
                for part in &mut window {
                    part.prepare(&mut binder)?;
                }
                let [offset, length] = window;
                links.insert(target, Link { source, offset, length });
            }
        }

        self.ctx = binder.context();
        let (tables, fetches) = binder.into_parts();
        let mut plan: Vec<SelectOneTable<'a>> = used
            .iter()
            .map(|&i| {
                let mut level = SelectOneTable::new(i, tables[i], fetch::TableFetch::plan(i, &fetches));
                level.link = links.remove(&i);
                level
            })
            .collect();
        plan = order_tables(plan);
        self.residual = assign_checks(&mut plan, conjuncts);

        for level in &plan {
            tracing::debug!(
                "table {} fetches {} column(s), {} check(s)",
                level.table.name(),
                level.fetch.columns.len(),
                level.checks.len()
            );
            let mut iter = level.table.iterator(&level.fetch.columns)?;
            level.fetch.refresh(&*iter, &mut self.ctx);
            iter.rewind()?;
            self.iterators.push(iter);
        }
        self.plan = plan;
        Ok(())
    }

    fn process(&mut self) -> Result<()> {
        if self.always_false {
            return Ok(());
        }
        if self.plan.is_empty() {
            self.ctx.candidates += 1;
            let accepted = self
                .residual
                .iter_mut()
                .all(|check| matches!(check.eval(&self.ctx), Some(v) if v != 0.0));
            if accepted {
                self.write_output()?;
            }
            return Ok(());
        }

        let innermost = self.plan.len() - 1;
        self.start(0)?;
        let mut frames = vec![0];
        while let Some(&level) = frames.last() {
            if !self.next_row(level)? {
                frames.pop();
                continue;
            }
            if level == innermost {
                self.write_output()?;
            } else {
                self.start(level + 1)?;
                frames.push(level + 1);
            }
        }
        Ok(())
    }

    fn start(&mut self, level: usize) -> Result<()> {
        self.plan[level].start(self.iterators[level].as_mut(), &self.ctx)
    }

    /// Advances one frame to its next row passing the frame's checks
    fn next_row(&mut self, level: usize) -> Result<bool> {
        let innermost = level + 1 == self.plan.len();
        let table = &mut self.plan[level];
        let iter = &mut self.iterators[level];
        while iter.next()? {
            if iter.metadata_changed() {
                table.fetch.refresh(&**iter, &mut self.ctx);
            }
            table.fetch.load(&**iter, &mut self.ctx);
            self.total += 1;
            if innermost {
                self.ctx.candidates += 1;
            }
            if table.accept(&self.ctx) {
                return Ok(true);
            }
            self.skips += 1;
        }
        Ok(false)
    }

    fn write_output(&mut self) -> Result<()> {
        self.ctx.row_number += 1;
        if !self.aggregate {
            let row = self
                .select
                .iter_mut()
                .map(|e| e.value(&self.ctx))
                .collect::<Result<Row>>()?;
            self.output.output(&row)?;
        } else if !self.mixed {
            for expr in &mut self.select {
                expr.partial_result(&self.ctx);
            }
        } else {
            let visible = self.select.len() - self.hidden;
            let (mut key, mut hidden) = (Vec::new(), Vec::new());
            for (i, (expr, aggregated)) in self.select.iter_mut().zip(&self.aggregated).enumerate() {
                match (*aggregated, i < visible) {
                    (true, _) => {}
                    (false, true) => key.push(expr.value(&self.ctx)?),
                    (false, false) => hidden.push(expr.value(&self.ctx)?),
                }
            }
            let group = self.groups.entry(key).or_insert_with(|| Group {
                aggregates: self
                    .select
                    .iter()
                    .zip(&self.aggregated)
                    .filter(|(_, aggregated)| **aggregated)
                    .map(|(e, _)| e.clone())
                    .collect(),
                hidden,
            });
            for expr in &mut group.aggregates {
                expr.partial_result(&self.ctx);
            }
        }
        Ok(())
    }

    fn post_execute(&mut self) -> Result<u64> {
        if self.aggregate && !self.mixed {
            // one row: non-aggregated sort keys have nothing to order
            let row = self
                .select
                .iter_mut()
                .zip(&self.aggregated)
                .map(|(e, aggregated)| if *aggregated { e.value(&self.ctx) } else { Ok(Value::Null) })
                .collect::<Result<Row>>()?;
            self.output.output(&row)?;
        } else if self.mixed {
            tracing::debug!("{} group(s)", self.groups.len());
            let visible = self.select.len() - self.hidden;
            for (key, mut group) in std::mem::take(&mut self.groups) {
                let mut key = key.into_iter();
                let mut hidden = group.hidden.into_iter();
                let mut results = group.aggregates.iter_mut();
                let mut row: Row = Vec::with_capacity(self.select.len());
                for (i, aggregated) in self.aggregated.iter().enumerate() {
                    let value = match (*aggregated, i < visible) {
                        (true, _) => match results.next() {
                            Some(e) => e.value(&self.ctx)?,
                            None => Value::Null,
                        },
                        (false, true) => key.next().unwrap_or(Value::Null),
                        (false, false) => hidden.next().unwrap_or(Value::Null),
                    };
                    row.push(value);
                }
                self.output.output(&row)?;
            }
        }

        self.output.flush()?;
        self.output.cleanup();
        let count = self.output.count();
        tracing::info!("matching row(s): {} out of {}", count, self.total);
        tracing::info!("skips: {}", self.skips);
        self.reset();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::{Environment, Select};
    use crate::{
        config::Config,
        error::Result,
        sql::{
            database::Database,
            expression::{Expression, FunctionRegistry},
            output::CaptureOutput,
            testing,
            types::{Row, Value},
        },
    };

    fn run(db: &Database, select: Vec<Expression>, tables: &[&str], filter: Option<Expression>) -> Result<Vec<Row>> {
        testing::init_logging();
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let env = Environment { database: db, functions: &functions, config: &config };
        let tables = tables.iter().map(|t| db.table(t)).collect::<Result<Vec<_>>>()?;
        let mut capture = CaptureOutput::new();
        {
            let mut query = Select::new(env, tables, select, 0, filter, Box::new(&mut capture));
            let count = query.execute()?;
            assert_eq!(count, query.output.count());
            // a second run produces the same rows
            assert_eq!(query.execute()?, count);
        }
        Ok(capture.into_rows())
    }

    #[test]
    fn test_link_join() -> Result<()> {
        let db = testing::link_example()?;
        let rows = run(&db, vec![Expression::column("aval"), Expression::column("bval")], &["a", "b"], None)?;
        let got: Vec<(f64, f64)> = rows
            .iter()
            .map(|r| (r[0].as_f64().unwrap_or(-1.0), r[1].as_f64().unwrap_or(-1.0)))
            .collect();
        assert_eq!(got, vec![(1.0, 10.0), (1.0, 20.0), (2.0, 30.0), (3.0, 40.0), (3.0, 50.0)]);
        Ok(())
    }

    #[test]
    fn test_pushed_down_checks() -> Result<()> {
        let db = testing::link_example()?;
        let functions = FunctionRegistry::new();
        let filter = functions.build(">", vec![Expression::column("aval"), Expression::number(1.0)])?;
        let rows = run(&db, vec![Expression::column("bval")], &["a", "b"], Some(filter))?;
        assert_eq!(rows.len(), 3);
        Ok(())
    }

    #[test]
    fn test_constant_where() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let never = functions.build("=", vec![Expression::number(1.0), Expression::number(2.0)])?;
        assert!(run(&db, vec![Expression::column("icol")], &["t"], Some(never))?.is_empty());

        let always = functions.build("=", vec![Expression::number(1.0), Expression::number(1.0)])?;
        assert_eq!(run(&db, vec![Expression::column("icol")], &["t"], Some(always))?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_aggregates() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();

        let sum = functions.build("sum", vec![Expression::column("rcol")])?;
        let count = functions.build("count", vec![Expression::column("icol")])?;
        assert_eq!(
            run(&db, vec![sum.clone(), count], &["t"], None)?,
            vec![vec![Value::Double(50.0), Value::Double(3.0)]]
        );

        // no input rows still produce one row
        let never = functions.build("<", vec![Expression::column("icol"), Expression::number(0.0)])?;
        let count = functions.build("count", vec![Expression::column("icol")])?;
        assert_eq!(
            run(&db, vec![count], &["t"], Some(never))?,
            vec![vec![Value::Double(0.0)]]
        );

        // grouped by the non-aggregated items, in key order
        let rows = run(&db, vec![Expression::column("rcol"), sum], &["t"], None)?;
        assert_eq!(
            rows,
            vec![
                vec![Value::Real(10.0), Value::Double(10.0)],
                vec![Value::Real(20.0), Value::Double(40.0)],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_rownumber_and_thin() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let rownumber = functions.build("rownumber", vec![])?;
        let rows = run(&db, vec![rownumber], &["t"], None)?;
        assert_eq!(rows, vec![vec![Value::Integer(1)], vec![Value::Integer(2)], vec![Value::Integer(3)]]);

        let thin = functions.build("thin", vec![Expression::number(2.0), Expression::column("icol")])?;
        let rows = run(&db, vec![Expression::column("icol")], &["t"], Some(thin))?;
        assert_eq!(rows, vec![vec![Value::Integer(1)], vec![Value::Integer(3)]]);
        Ok(())
    }

    #[test]
    fn test_no_tables() -> Result<()> {
        let db = Database::new("db");
        let functions = FunctionRegistry::new();
        let sum = functions.build("+", vec![Expression::number(1.0), Expression::number(2.0)])?;
        assert_eq!(run(&db, vec![sum], &[], None)?, vec![vec![Value::Double(3.0)]]);
        Ok(())
    }
}
