//! Expression trees
//!
//! An `Expression` is built from the AST by the planner, bound to fetch slots
//! by `prepare`, evaluated once per joined row against a `RowContext`, and
//! released by `cleanup` so the same tree can be prepared again.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    sync::Arc,
};

use crate::{
    config::Config,
    error::{Error, Result},
    sql::{
        database::Database,
        schema::{SqlColumn, Table},
        types::{TypeKind, TypeRef, Value, unpack_string},
    },
};

pub mod column;
pub mod constant;
pub mod function;

pub use column::{ColumnExpression, ShiftedExpression};
pub use constant::{NumberExpression, StringExpression};
pub use function::{FunctionExpression, FunctionInfo, FunctionRegistry};

/// Index of a fetched value in the row context
pub type SlotId = usize;

/// Current value of one fetched column
#[derive(Debug, Clone)]
pub struct Slot {
    pub data: Vec<f64>,
    pub missing: bool,
    pub has_missing: bool,
    pub missing_value: f64,
    pub kind: TypeKind,
}

impl Slot {
    pub fn new(column: &SqlColumn) -> Self {
        Self {
            data: vec![0.0; column.ty.size.max(1)],
            missing: false,
            has_missing: column.has_missing,
            missing_value: column.missing_value,
            kind: column.ty.kind,
        }
    }

    /// Copies the current row's value and flags it against the missing value
    pub fn load(&mut self, data: &[f64]) {
        if self.data.len() != data.len() {
            self.data.resize(data.len(), 0.0);
        }
        self.data.copy_from_slice(data);
        self.missing = self.has_missing && self.data.first() == Some(&self.missing_value);
    }

    pub fn number(&self) -> Option<f64> {
        if self.missing {
            return None;
        }
        self.data.first().copied()
    }

    pub fn text(&self) -> Option<String> {
        if self.missing {
            return None;
        }
        Some(unpack_string(&self.data))
    }
}

/// Values visible to expressions while evaluating one joined row
#[derive(Debug, Clone, Default)]
pub struct RowContext {
    pub slots: Vec<Slot>,
    /// Rows accepted so far, the current one included once it passed all checks
    pub row_number: u64,
    /// Fully joined rows that reached the final checks
    pub candidates: u64,
}

impl RowContext {
    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id)
    }
}

/// One column fetched from one of the bound tables
#[derive(Debug, Clone)]
pub struct Fetch {
    /// Index into the binder's table list
    pub table: usize,
    pub column: Arc<SqlColumn>,
}

/// Result of binding a column name
#[derive(Debug, Clone)]
pub struct BoundColumn {
    pub slot: SlotId,
    pub table: usize,
    pub ty: TypeRef,
    pub full_name: String,
    /// Mask and shift of a bitfield field
    pub bits: Option<(u64, u32)>,
    /// Slot holds the bit pattern of a 64-bit integer
    pub int_bits: bool,
}

/// Binding environment of one SELECT: resolves column names against the
/// FROM tables and hands out fetch slots, one per distinct column
pub struct Binder<'a> {
    pub database: &'a Database,
    pub functions: &'a FunctionRegistry,
    pub config: &'a Config,
    tables: Vec<&'a Table>,
    fetches: Vec<Fetch>,
    slots: BTreeMap<String, SlotId>,
}

impl<'a> Binder<'a> {
    pub fn new(
        database: &'a Database,
        functions: &'a FunctionRegistry,
        config: &'a Config,
        tables: Vec<&'a Table>,
    ) -> Self {
        Self {
            database,
            functions,
            config,
            tables,
            fetches: Vec::new(),
            slots: BTreeMap::new(),
        }
    }

    pub fn tables(&self) -> &[&'a Table] {
        &self.tables
    }

    pub fn fetches(&self) -> &[Fetch] {
        &self.fetches
    }

    /// The only table among the FROM tables that has the column
    pub fn find_table(&self, column: &str) -> Result<usize> {
        let mut found = Vec::new();
        for (i, table) in self.tables.iter().enumerate() {
            if table.has_column(column)?.is_some() {
                found.push(i);
            }
        }
        match found.len() {
            0 => Err(Error::User(format!("can't find a table for {}", column))),
            1 => Ok(found[0]),
            _ => Err(Error::User(format!("ambiguous column name {}", column))),
        }
    }

    /// Position of a table in the binding list, adding it from the database
    /// when the query did not name it
    pub fn table_index(&mut self, name: &str) -> Result<usize> {
        if let Some(i) = self.tables.iter().position(|t| t.name() == name) {
            return Ok(i);
        }
        let table = self.database.table(name)?;
        self.tables.push(table);
        Ok(self.tables.len() - 1)
    }

    /// Adds a column to the fetch list of its table; columns are shared by
    /// full name
    pub fn ensure_fetch(&mut self, table: usize, column: Arc<SqlColumn>) -> SlotId {
        let name = column.full_name();
        if let Some(slot) = self.slots.get(&name) {
            return *slot;
        }
        let slot = self.fetches.len();
        self.fetches.push(Fetch { table, column });
        self.slots.insert(name, slot);
        slot
    }

    /// Binds a column name, in `table` or in whichever FROM table has it
    pub fn column(&mut self, name: &str, table: Option<usize>) -> Result<BoundColumn> {
        let table = match table {
            Some(t) => t,
            None => self.find_table(name)?,
        };
        let owner = *self
            .tables
            .get(table)
            .ok_or(Error::SeriousBug(format!("table {} not bound", table)))?;
        let column = owner.column(name)?;
        let (fetched, bits) = match &column.view {
            Some(view) => (owner.column_by_id(view.parent)?, Some((view.mask, view.shift))),
            None => (column.clone(), None),
        };
        tracing::debug!("accessing column {}", column.full_name());
        let int_bits = !self.config.treat_integers_as_doubles && fetched.ty.kind.is_integral();
        let slot = self.ensure_fetch(table, fetched);
        Ok(BoundColumn {
            slot,
            table,
            ty: column.ty.clone(),
            full_name: column.full_name(),
            bits,
            int_bits,
        })
    }

    /// Fresh row context with one slot per fetch
    pub fn context(&self) -> RowContext {
        RowContext {
            slots: self.fetches.iter().map(|f| Slot::new(&f.column)).collect(),
            ..Default::default()
        }
    }

    pub fn into_parts(self) -> (Vec<&'a Table>, Vec<Fetch>) {
        (self.tables, self.fetches)
    }
}

/// Expression tree node
#[derive(Debug, Clone)]
pub enum Expression {
    Number(NumberExpression),
    String(StringExpression),
    Column(ColumnExpression),
    Shifted(ShiftedExpression),
    Function(FunctionExpression),
}

impl Expression {
    pub fn number(value: f64) -> Self {
        Expression::Number(NumberExpression::new(Some(value)))
    }

    pub fn missing() -> Self {
        Expression::Number(NumberExpression::new(None))
    }

    pub fn string(value: &str) -> Self {
        Expression::String(StringExpression::new(value))
    }

    pub fn column(name: &str) -> Self {
        Expression::Column(ColumnExpression::new(name, None))
    }

    /// Display title: the alias or resolved column name when set, otherwise the expression text
    pub fn title(&self) -> String {
        let title = match self {
            Expression::Number(e) => &e.title,
            Expression::String(e) => &e.title,
            Expression::Column(e) => &e.title,
            Expression::Shifted(e) => &e.column.title,
            Expression::Function(e) => &e.title,
        };
        title.clone().unwrap_or_else(|| self.to_string())
    }

    pub fn set_title(&mut self, title: &str) {
        let slot = match self {
            Expression::Number(e) => &mut e.title,
            Expression::String(e) => &mut e.title,
            Expression::Column(e) => &mut e.title,
            Expression::Shifted(e) => &mut e.column.title,
            Expression::Function(e) => &mut e.title,
        };
        *slot = Some(title.to_string());
    }

    /// Binds columns and types; must run before `eval`
    pub fn prepare(&mut self, binder: &mut Binder) -> Result<()> {
        match self {
            Expression::Number(e) => e.prepare(binder),
            Expression::String(e) => e.prepare(binder),
            Expression::Column(e) => e.prepare(binder),
            Expression::Shifted(e) => e.prepare(binder),
            Expression::Function(e) => e.prepare(binder),
        }
    }

    /// Numeric value for the current row, `None` when missing
    pub fn eval(&mut self, ctx: &RowContext) -> Option<f64> {
        match self {
            Expression::Number(e) => e.value,
            Expression::String(e) => e.eval(),
            Expression::Column(e) => e.eval(ctx),
            Expression::Shifted(e) => e.eval(ctx),
            Expression::Function(e) => e.eval(ctx),
        }
    }

    pub fn eval_as_string(&mut self, ctx: &RowContext) -> Option<String> {
        match self {
            Expression::String(e) => Some(e.value.clone()),
            Expression::Column(e) => e.eval_as_string(ctx),
            Expression::Shifted(e) => e.eval_as_string(ctx),
            other => other.eval(ctx).map(|v| v.to_string()),
        }
    }

    /// Evaluates into a typed value, by the kind of the bound type
    pub fn value(&mut self, ctx: &RowContext) -> Result<Value> {
        let ty = self.sql_type()?;
        Ok(match ty.kind {
            TypeKind::String | TypeKind::Blob => match self.eval_as_string(ctx) {
                Some(s) => Value::String(s),
                None => Value::Null,
            },
            _ => ty.value(self.eval(ctx)),
        })
    }

    /// Releases bound state so the expression can be prepared again
    pub fn cleanup(&mut self) {
        match self {
            Expression::Number(_) | Expression::String(_) => {}
            Expression::Column(e) => e.cleanup(),
            Expression::Shifted(e) => e.cleanup(),
            Expression::Function(e) => e.cleanup(),
        }
    }

    /// Folds constant subtrees, returning a replacement when something changed
    pub fn simplify(&mut self, changed: &mut bool) -> Result<Option<Expression>> {
        match self {
            Expression::Function(e) => e.simplify(changed),
            _ => Ok(None),
        }
    }

    /// Splits top level AND conjunctions
    pub fn and_split(self) -> Vec<Expression> {
        match self {
            Expression::Function(f) if f.is_and() => {
                let mut parts = Vec::new();
                for arg in f.args {
                    parts.extend(arg.and_split());
                }
                parts
            }
            other => vec![other],
        }
    }

    pub fn is_aggregate(&self) -> bool {
        match self {
            Expression::Function(e) => e.is_aggregate(),
            _ => false,
        }
    }

    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Number(_) | Expression::String(_) => true,
            Expression::Column(_) | Expression::Shifted(_) => false,
            Expression::Function(e) => e.is_constant(),
        }
    }

    /// Collects the bound tables the expression reads
    pub fn tables(&self, out: &mut BTreeSet<usize>) {
        match self {
            Expression::Column(e) => e.tables(out),
            Expression::Shifted(e) => e.column.tables(out),
            Expression::Function(e) => {
                for arg in &e.args {
                    arg.tables(out);
                }
            }
            Expression::Number(_) | Expression::String(_) => {}
        }
    }

    /// Replaces `*`, `table.*`, `bitfield.*`, ranges and `/regex/` patterns
    /// with the concrete columns they stand for
    pub fn expand_stars(self, tables: &[&Table], out: &mut Vec<Expression>) -> Result<()> {
        match self {
            Expression::Column(e) => e.expand_stars(tables, out),
            Expression::String(e) if e.is_pattern() => e.expand_pattern(tables, out),
            other => {
                out.push(other);
                Ok(())
            }
        }
    }

    /// Folds the current row into the aggregates of this tree
    pub fn partial_result(&mut self, ctx: &RowContext) {
        if let Expression::Function(e) = self {
            e.partial_result(ctx);
        }
    }

    pub fn sql_type(&self) -> Result<TypeRef> {
        let ty = match self {
            Expression::Number(e) => &e.ty,
            Expression::String(e) => &e.ty,
            Expression::Column(e) => return e.sql_type(),
            Expression::Shifted(e) => return e.column.sql_type(),
            Expression::Function(e) => &e.ty,
        };
        ty.clone()
            .ok_or(Error::SeriousBug(format!("expression {} has no type, it was not prepared", self)))
    }

    pub fn is_string(&self) -> bool {
        self.sql_type().map(|t| t.kind == TypeKind::String).unwrap_or(false)
    }

    /// Moves every column `-min_shift` rows further back in history, so that
    /// no column reads ahead of the current row
    pub fn reshift(self, min_shift: i32) -> Expression {
        if min_shift == 0 {
            return self;
        }
        match self {
            Expression::Column(c) => Expression::Shifted(ShiftedExpression::new(c, -min_shift)),
            Expression::Shifted(s) => s.reshift(min_shift),
            Expression::Function(mut f) => {
                f.args = f.args.into_iter().map(|a| a.reshift(min_shift)).collect();
                Expression::Function(f)
            }
            other => other,
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Number(e) => write!(f, "{}", e),
            Expression::String(e) => write!(f, "{}", e),
            Expression::Column(e) => write!(f, "{}", e),
            Expression::Shifted(e) => write!(f, "{}", e),
            Expression::Function(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{Binder, Expression, FunctionRegistry};
    use crate::{
        config::Config,
        error::Result,
        sql::{testing, types::Value},
    };

    #[test]
    fn test_binder_shares_slots() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![db.table("t")?]);

        let a = binder.column("icol", None)?;
        let b = binder.column("icol@t", None)?;
        let c = binder.column("rcol", None)?;
        assert_eq!(a.slot, b.slot);
        assert_ne!(a.slot, c.slot);
        assert_eq!(a.full_name, "icol@t");
        assert_eq!(binder.fetches().len(), 2);
        assert!(binder.column("nothing", None).is_err());
        Ok(())
    }

    #[test]
    fn test_simplify() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![db.table("t")?]);

        // (1 + 2 > 2) and icol > 1  ->  icol > 1
        let cmp = functions.build(">", vec![Expression::column("icol"), Expression::number(1.0)])?;
        let sum = functions.build("+", vec![Expression::number(1.0), Expression::number(2.0)])?;
        let constant = functions.build(">", vec![sum, Expression::number(2.0)])?;
        let mut expr = functions.build("and", vec![constant, cmp])?;
        expr.prepare(&mut binder)?;

        let mut changed = true;
        while changed {
            changed = false;
            if let Some(e) = expr.simplify(&mut changed)? {
                expr = e;
            }
        }
        assert_eq!(expr.to_string(), "(icol > 1)");
        assert!(!expr.is_constant());

        let mut tables = BTreeSet::new();
        expr.tables(&mut tables);
        assert_eq!(tables.into_iter().collect::<Vec<_>>(), vec![0]);

        let mut ctx = binder.context();
        ctx.slots[0].load(&[3.0]);
        assert_eq!(expr.value(&ctx)?, Value::Double(1.0));
        Ok(())
    }

    #[test]
    fn test_and_split() -> Result<()> {
        let functions = FunctionRegistry::new();
        let a = functions.build("=", vec![Expression::column("a"), Expression::number(1.0)])?;
        let b = functions.build("=", vec![Expression::column("b"), Expression::number(2.0)])?;
        let c = functions.build("=", vec![Expression::column("c"), Expression::number(3.0)])?;
        let ab = functions.build("and", vec![a, b])?;
        let abc = functions.build("and", vec![ab, c])?;
        let parts: Vec<String> = abc.and_split().iter().map(|e| e.to_string()).collect();
        assert_eq!(parts, vec!["(a = 1)", "(b = 2)", "(c = 3)"]);
        Ok(())
    }
}
