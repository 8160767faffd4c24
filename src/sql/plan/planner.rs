use std::{fs::File, io::BufWriter};

use crate::{
    config::Config,
    error::{Error, Result},
    sql::{
        ast::{Expr, OrderDirection, SelectStatement},
        database::Database,
        executor::{Environment, Select},
        expression::{ColumnExpression, Expression, FunctionRegistry, RowContext, ShiftedExpression},
        output::{DistinctOutput, OrderByOutput, Output, SimpleOutput},
        schema::Table,
    },
};

/// Query planner - turns a SELECT statement into an executable `Select`
///
/// Builds expression trees from the AST, expands stars, reshifts row
/// history so no column reads ahead, resolves ORDER BY keys and chains the
/// output sinks: DISTINCT, then ORDER BY, then the endpoint.
pub struct SelectFactory<'a> {
    env: Environment<'a>,
}

impl<'a> SelectFactory<'a> {
    pub fn new(database: &'a Database, functions: &'a FunctionRegistry, config: &'a Config) -> Self {
        Self {
            env: Environment {
                database,
                functions,
                config,
            },
        }
    }

    pub fn create(&self, stmt: &SelectStatement, output: Box<dyn Output + 'a>) -> Result<Select<'a>> {
        tracing::debug!("planning {}", stmt);
        let tables = self.tables(stmt)?;

        let mut select = Vec::new();
        for (expr, alias) in &stmt.select {
            let before = select.len();
            self.expression(expr)?.expand_stars(&tables, &mut select)?;
            if let Some(alias) = alias {
                match &mut select[before..] {
                    [item] => item.set_title(alias),
                    items => tracing::warn!("alias {} ignored for {} columns", alias, items.len()),
                }
            }
        }
        let visible = select.len();

        let mut order_by = Vec::with_capacity(stmt.order_by.len());
        for (expr, direction) in &stmt.order_by {
            let position = match self.order_position(expr, &select[..visible]) {
                Some(position) => position,
                None => {
                    select.push(self.expression(expr)?);
                    select.len() - 1
                }
            };
            order_by.push((position, *direction));
        }
        let hidden = select.len() - visible;

        let mut where_clause = match &stmt.where_clause {
            Some(expr) => Some(self.expression(expr)?),
            None => None,
        };

        let min_shift = select.iter().chain(&where_clause).map(min_shift).min().unwrap_or(0);
        if min_shift < 0 {
            tracing::debug!("reshifting select list and WHERE by {}", -min_shift);
            select = select.into_iter().map(|e| e.reshift(min_shift)).collect();
            where_clause = where_clause.map(|e| e.reshift(min_shift));
        }

        if !stmt.group_by.is_empty() {
            tracing::warn!("GROUP BY clause seen and ignored, non aggregated values on the select list are used instead");
        }

        if tables.is_empty() {
            if let Some(expr) = select.iter().find(|e| !e.is_constant()) {
                return Err(Error::User(format!("no table to read {} from", expr)));
            }
        }

        let mut output: Box<dyn Output + 'a> = match &stmt.into {
            Some(path) => {
                tracing::debug!("writing into {}", path);
                let file = BufWriter::new(File::create(path)?);
                Box::new(SimpleOutput::new(file, self.env.config.output.clone()))
            }
            None => output,
        };
        if !order_by.is_empty() {
            output = OrderByOutput::new(output, order_by);
        }
        if stmt.distinct {
            output = DistinctOutput::new(output);
        }

        Ok(Select::new(self.env, tables, select, hidden, where_clause, output))
    }

    fn tables(&self, stmt: &SelectStatement) -> Result<Vec<&'a Table>> {
        let database = self.env.database;
        if stmt.from.is_empty() {
            tracing::debug!("no FROM clause, using implicit tables");
            return database.implicit_tables().iter().map(|t| database.table(t)).collect();
        }
        stmt.from
            .iter()
            .map(|t| match &t.database {
                Some(name) if name != database.name() => {
                    Err(Error::User(format!("database {} is not open", name)))
                }
                _ => database.table(&t.name),
            })
            .collect()
    }

    /// Builds the expression tree of one AST node
    pub fn expression(&self, expr: &Expr) -> Result<Expression> {
        Ok(match expr {
            Expr::Number(v) => Expression::number(*v),
            Expr::Null => Expression::missing(),
            Expr::String(s) => Expression::string(s),
            Expr::Variable(name) => self.expression(self.env.database.variable(name)?)?,
            Expr::Star { table_reference } => {
                Expression::Column(ColumnExpression::new("*", table_reference.as_deref()))
            }
            Expr::Column(c) => {
                let mut name = c.name.clone();
                if let Some(index) = &c.index {
                    name = format!("{}_{}", name, self.constant(index, "vector index")? as i64);
                }
                if let Some(field) = &c.field {
                    name = format!("{}.{}", name, field);
                }
                let mut column = ColumnExpression::new(&name, c.table_reference.as_deref());
                column.range = c.range;
                let shift = match &c.shift {
                    Some(shift) => self.constant(shift, "shift operator")? as i32,
                    None => 0,
                };
                column.nominal_shift = shift;
                if shift == 0 {
                    Expression::Column(column)
                } else {
                    Expression::Shifted(ShiftedExpression::new(column, -shift))
                }
            }
            Expr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| match a {
                        // count(*) counts every row
                        Expr::Star { .. } => Ok(Expression::number(1.0)),
                        a => self.expression(a),
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.env.functions.build(name, args)?
            }
            Expr::Match { exprs, subquery } => {
                let args = exprs.iter().map(|a| self.expression(a)).collect::<Result<Vec<_>>>()?;
                self.env.functions.build_match(args, (**subquery).clone())?
            }
        })
    }

    fn constant(&self, expr: &Expr, what: &str) -> Result<f64> {
        let mut value = self.expression(expr)?;
        if !value.is_constant() {
            return Err(Error::User(format!("value of {} must be constant, got {}", what, expr)));
        }
        value
            .eval(&RowContext::default())
            .ok_or(Error::User(format!("value of {} is missing", what)))
    }

    /// Select list position an ORDER BY term refers to: a 1-based position,
    /// an alias, or the text of a select item
    fn order_position(&self, expr: &Expr, select: &[Expression]) -> Option<usize> {
        if let Expr::Number(n) = expr {
            if n.fract() == 0.0 && *n >= 1.0 && (*n as usize) <= select.len() {
                return Some(*n as usize - 1);
            }
            return None;
        }
        let text = expr.to_string();
        select
            .iter()
            .position(|e| e.title() == text || e.to_string() == text)
    }
}

/// Smallest shift used anywhere in the tree, zero when nothing is shifted
fn min_shift(expr: &Expression) -> i32 {
    match expr {
        Expression::Shifted(s) => s.shift.min(0),
        Expression::Function(f) => f.args.iter().map(min_shift).min().unwrap_or(0),
        _ => 0,
    }
}
