use std::fmt::Display;

use crate::{
    error::{Error, Result},
    sql::{
        expression::{Binder, Expression},
        schema::Table,
        types::{TypeRef, pack_string},
    },
};

/// Numeric constant; `None` is the missing value
#[derive(Debug, Clone)]
pub struct NumberExpression {
    pub value: Option<f64>,
    pub title: Option<String>,
    pub(crate) ty: Option<TypeRef>,
}

impl NumberExpression {
    pub fn new(value: Option<f64>) -> Self {
        Self {
            value,
            title: None,
            ty: None,
        }
    }

    /// Constant carrying the type and title of the expression it replaces
    pub fn folded(value: Option<f64>, title: String, ty: Option<TypeRef>) -> Self {
        Self {
            value,
            title: Some(title),
            ty,
        }
    }

    pub fn prepare(&mut self, binder: &mut Binder) -> Result<()> {
        if self.ty.is_none() {
            self.ty = Some(binder.database.types().lookup("double")?);
        }
        Ok(())
    }
}

impl Display for NumberExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.title, self.value) {
            (Some(title), _) => write!(f, "{}", title),
            (None, Some(v)) => write!(f, "{}", v),
            (None, None) => write!(f, "NULL"),
        }
    }
}

/// String constant
#[derive(Debug, Clone)]
pub struct StringExpression {
    pub value: String,
    pub title: Option<String>,
    pub(crate) ty: Option<TypeRef>,
}

impl StringExpression {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            title: None,
            ty: None,
        }
    }

    pub fn prepare(&mut self, binder: &mut Binder) -> Result<()> {
        let doubles = self.value.len().div_ceil(8).max(1);
        self.ty = Some(binder.database.types().lookup_sized("string", doubles)?);
        Ok(())
    }

    /// First eight bytes of the string, packed like a stored string
    pub fn eval(&self) -> Option<f64> {
        pack_string(&self.value, 1).first().copied()
    }

    /// `/regex/` in a select list stands for the columns it matches
    pub fn is_pattern(&self) -> bool {
        self.value.len() >= 2 && self.value.starts_with('/') && self.value.ends_with('/')
    }

    pub fn expand_pattern(self, tables: &[&Table], out: &mut Vec<Expression>) -> Result<()> {
        let pattern = regex::Regex::new(&self.value[1..self.value.len() - 1])?;
        let before = out.len();
        for table in tables {
            for column in table.columns() {
                if column.link || !pattern.is_match(&column.name) {
                    continue;
                }
                let mut expr = super::ColumnExpression::new(&column.name, None);
                expr.table = Some(table.name().to_string());
                out.push(Expression::Column(expr));
            }
        }
        if out.len() == before {
            return Err(Error::User(format!("no columns matching {}", self.value)));
        }
        Ok(())
    }
}

impl Display for StringExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.title {
            Some(title) => write!(f, "{}", title),
            None => write!(f, "'{}'", self.value),
        }
    }
}
