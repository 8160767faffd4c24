use std::{
    collections::{BTreeSet, VecDeque},
    fmt::Display,
};

use crate::{
    error::{Error, Result},
    sql::{
        expression::{Binder, BoundColumn, Expression, RowContext},
        schema::Table,
        types::{TypeKind, TypeRef},
    },
};

/// Reference to a column of one of the FROM tables
#[derive(Debug, Clone)]
pub struct ColumnExpression {
    /// Column name without the table reference
    pub name: String,
    /// `@table` suffix as written
    pub table_reference: Option<String>,
    /// Table the column was expanded from, bypassing name lookup
    pub table: Option<String>,
    /// Inclusive vector range, expanded before binding
    pub range: Option<(i64, i64)>,
    /// Shift as written in the query, only used for display
    pub nominal_shift: i32,
    pub title: Option<String>,
    pub(crate) bound: Option<BoundColumn>,
}

impl ColumnExpression {
    pub fn new(name: &str, table_reference: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            table_reference: table_reference.map(|r| r.to_string()),
            table: None,
            range: None,
            nominal_shift: 0,
            title: None,
            bound: None,
        }
    }

    /// Name used for lookup: `name@table` when a table reference was given
    pub fn qualified_name(&self) -> String {
        format!("{}{}", self.name, self.table_reference.as_deref().unwrap_or(""))
    }

    pub fn prepare(&mut self, binder: &mut Binder) -> Result<()> {
        if self.range.is_some() {
            return Err(Error::SeriousBug(format!("column range {} was not expanded", self)));
        }
        let table = match &self.table {
            Some(name) => Some(binder.table_index(name)?),
            None => None,
        };
        let bound = binder.column(&self.qualified_name(), table)?;
        if self.title.is_none() && self.nominal_shift == 0 && bound.full_name != self.qualified_name() {
            self.title = Some(bound.full_name.clone());
        }
        self.bound = Some(bound);
        Ok(())
    }

    pub fn eval(&self, ctx: &RowContext) -> Option<f64> {
        let bound = self.bound.as_ref()?;
        let x = ctx.slot(bound.slot)?.number()?;
        let x = if bound.int_bits { x.to_bits() as i64 as f64 } else { x };
        match bound.bits {
            Some((mask, shift)) => Some((((x as u64) & mask) >> shift) as f64),
            None => Some(x),
        }
    }

    pub fn eval_as_string(&self, ctx: &RowContext) -> Option<String> {
        let bound = self.bound.as_ref()?;
        let slot = ctx.slot(bound.slot)?;
        if bound.ty.kind == TypeKind::String {
            return slot.text();
        }
        self.eval(ctx).map(|v| v.to_string())
    }

    pub fn cleanup(&mut self) {
        self.bound = None;
    }

    pub fn sql_type(&self) -> Result<TypeRef> {
        self.bound
            .as_ref()
            .map(|b| b.ty.clone())
            .ok_or(Error::SeriousBug(format!("column {} was not prepared", self)))
    }

    pub fn tables(&self, out: &mut BTreeSet<usize>) {
        if let Some(bound) = &self.bound {
            out.insert(bound.table);
        }
    }

    fn sibling(&self, name: &str, table: Option<&str>) -> Expression {
        let mut column = ColumnExpression::new(name, self.table_reference.as_deref());
        column.table = table.map(|t| t.to_string()).or(self.table.clone());
        Expression::Column(column)
    }

    pub fn expand_stars(self, tables: &[&Table], out: &mut Vec<Expression>) -> Result<()> {
        if let Some((begin, end)) = self.range {
            if begin > end {
                return Err(Error::User(format!("empty column range {}", self)));
            }
            for i in begin..=end {
                out.push(self.sibling(&format!("{}_{}", self.name, i), None));
            }
            return Ok(());
        }

        if self.name == "*" {
            let before = out.len();
            for table in tables {
                for column in table.columns() {
                    if column.link {
                        continue;
                    }
                    if let Some(reference) = &self.table_reference {
                        if !column.full_name().ends_with(reference.as_str()) {
                            continue;
                        }
                    }
                    let mut expr = ColumnExpression::new(&column.name, None);
                    expr.table = Some(table.name().to_string());
                    out.push(Expression::Column(expr));
                }
            }
            if out.len() == before {
                return Err(Error::User(format!("no columns matching {}", self.qualified_name())));
            }
            return Ok(());
        }

        if let Some(parent) = self.name.strip_suffix(".*") {
            let qualified = format!("{}{}", parent, self.table_reference.as_deref().unwrap_or(""));
            let owner = match &self.table {
                Some(name) => tables.iter().find(|t| t.name() == name.as_str()),
                None => {
                    let mut found = None;
                    for table in tables {
                        if table.has_column(&qualified)?.is_some() {
                            found = Some(table);
                            break;
                        }
                    }
                    found
                }
            }
            .ok_or(Error::User(format!("can't find a table for {}", qualified)))?;
            let stored = owner.column(&qualified)?;
            for field in owner.bit_column_names(&stored.name)? {
                out.push(self.sibling(&format!("{}.{}", parent, field), Some(owner.name())));
            }
            return Ok(());
        }

        out.push(Expression::Column(self));
        Ok(())
    }
}

impl Display for ColumnExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.qualified_name())?;
        if let Some((begin, end)) = self.range {
            write!(f, "[{}:{}]", begin, end)?;
        }
        if self.nominal_shift != 0 {
            write!(f, "#{}", self.nominal_shift)?;
        }
        Ok(())
    }
}

/// Column read `shift` rows back: the first `shift` rows see missing values
#[derive(Debug, Clone)]
pub struct ShiftedExpression {
    pub column: ColumnExpression,
    /// Rows of history; negative until the select list is reshifted
    pub shift: i32,
    values: VecDeque<Option<f64>>,
    strings: VecDeque<Option<String>>,
}

impl ShiftedExpression {
    pub fn new(column: ColumnExpression, shift: i32) -> Self {
        Self {
            column,
            shift,
            values: VecDeque::new(),
            strings: VecDeque::new(),
        }
    }

    pub fn prepare(&mut self, binder: &mut Binder) -> Result<()> {
        self.column.prepare(binder)
    }

    pub fn eval(&mut self, ctx: &RowContext) -> Option<f64> {
        if self.shift <= 0 {
            return self.column.eval(ctx);
        }
        if self.values.is_empty() {
            self.values.resize(self.shift as usize, None);
        }
        let old = self.values.pop_back().flatten();
        self.values.push_front(self.column.eval(ctx));
        old
    }

    pub fn eval_as_string(&mut self, ctx: &RowContext) -> Option<String> {
        if self.shift <= 0 {
            return self.column.eval_as_string(ctx);
        }
        if self.strings.is_empty() {
            self.strings.resize(self.shift as usize, None);
        }
        let old = self.strings.pop_back().flatten();
        self.strings.push_front(self.column.eval_as_string(ctx));
        old
    }

    pub fn cleanup(&mut self) {
        self.values.clear();
        self.strings.clear();
        self.column.cleanup();
    }

    pub fn reshift(self, min_shift: i32) -> Expression {
        let shift = self.shift - min_shift;
        if shift == 0 {
            Expression::Column(self.column)
        } else {
            Expression::Shifted(ShiftedExpression::new(self.column, shift))
        }
    }
}

impl Display for ShiftedExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnExpression, ShiftedExpression};
    use crate::{
        config::Config,
        error::{Error, Result},
        sql::{
            expression::{Binder, Expression, FunctionRegistry},
            testing,
        },
    };

    #[test]
    fn test_title_patch() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![db.table("t")?]);

        let mut column = Expression::column("icol");
        assert_eq!(column.title(), "icol");
        column.prepare(&mut binder)?;
        assert_eq!(column.title(), "icol@t");
        assert_eq!(column.to_string(), "icol");

        let mut aliased = Expression::column("rcol");
        aliased.set_title("r");
        aliased.prepare(&mut binder)?;
        assert_eq!(aliased.title(), "r");
        Ok(())
    }

    #[test]
    fn test_shift() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![db.table("t")?]);

        let mut column = ColumnExpression::new("icol", None);
        column.nominal_shift = -2;
        let mut shifted = ShiftedExpression::new(column, 2);
        shifted.prepare(&mut binder)?;
        assert_eq!(shifted.to_string(), "icol#-2");

        let mut ctx = binder.context();
        let mut seen = Vec::new();
        for x in [1.0, 2.0, 3.0, 4.0] {
            ctx.slots[0].load(&[x]);
            seen.push(shifted.eval(&ctx));
        }
        assert_eq!(seen, vec![None, None, Some(1.0), Some(2.0)]);

        // reshifting by a lead of one elsewhere turns a lag of two into a lag of three
        let lag = Expression::Shifted(shifted).reshift(-1);
        assert!(matches!(&lag, Expression::Shifted(s) if s.shift == 3));
        let plain = Expression::Shifted(ShiftedExpression::new(ColumnExpression::new("icol", None), -1)).reshift(-1);
        assert!(matches!(plain, Expression::Column(_)));
        Ok(())
    }

    #[test]
    fn test_expand_stars() -> Result<()> {
        let db = testing::worked_example()?;
        let tables = vec![db.table("t")?];

        let mut out = Vec::new();
        Expression::column("*").expand_stars(&tables, &mut out)?;
        let names: Vec<String> = out.iter().map(|e| e.to_string()).collect();
        assert_eq!(names, vec!["icol", "rcol"]);

        let mut range = ColumnExpression::new("v", None);
        range.range = Some((1, 3));
        let mut out = Vec::new();
        Expression::Column(range).expand_stars(&tables, &mut out)?;
        let names: Vec<String> = out.iter().map(|e| e.to_string()).collect();
        assert_eq!(names, vec!["v_1", "v_2", "v_3"]);

        let mut out = Vec::new();
        let missing = ColumnExpression::new("*", Some("@nothing"));
        assert!(matches!(
            Expression::Column(missing).expand_stars(&tables, &mut out),
            Err(Error::User(_))
        ));

        let mut out = Vec::new();
        Expression::string("/^r/").expand_stars(&tables, &mut out)?;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to_string(), "rcol");
        Ok(())
    }
}
