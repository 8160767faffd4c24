use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Abstract Syntax Tree (AST) node definitions, as produced by an external parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// SELECT statement
    Select(SelectStatement),
    /// INSERT statement, accepted but not executed
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<Expr>>,
    },
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectStatement {
    pub distinct: bool,
    pub all: bool,
    /// Column expressions with optional aliases (e.g. count(*) as cnt)
    pub select: Vec<(Expr, Option<String>)>,
    /// Target file of `INTO 'file'`
    pub into: Option<String>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    /// Accepted and ignored, non-aggregated select items group instead
    pub group_by: Vec<Expr>,
    pub order_by: Vec<(Expr, OrderDirection)>,
}

/// FROM clause item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub database: Option<String>,
}

/// Sort direction (ascending or descending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Column reference: `name[.field][@table][index]#shift`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnRef {
    pub name: String,
    /// Bitfield field, or `*` for all fields
    pub field: Option<String>,
    /// `@table` suffix, kept with its `@`
    pub table_reference: Option<String>,
    /// Vector index: `col[2]` means column `col_2`
    pub index: Option<Box<Expr>>,
    /// Inclusive index range: `col[1:3]` means `col_1, col_2, col_3`
    pub range: Option<(i64, i64)>,
    /// `col#-1` is the value of `col` one row back
    pub shift: Option<Box<Expr>>,
}

/// Expression types (constants, column refs, variables, stars, function calls)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number(f64),
    /// Missing value constant
    Null,
    /// String literal; `/regex/` in a select list selects matching columns
    String(String),
    Column(ColumnRef),
    /// `$name`, resolved against the database variables
    Variable(String),
    /// `*`, or `*@table`
    Star { table_reference: Option<String> },
    /// Function call or operator; operators use their symbol as name
    Function { name: String, args: Vec<Expr> },
    /// `match(a, b) in (select x, y from ...)`
    Match { exprs: Vec<Expr>, subquery: Box<SelectStatement> },
}

impl Expr {
    pub fn number(value: f64) -> Self {
        Expr::Number(value)
    }

    pub fn string(value: &str) -> Self {
        Expr::String(value.to_string())
    }

    pub fn column(name: &str) -> Self {
        Expr::Column(ColumnRef {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// `column@table`
    pub fn column_in(name: &str, table: &str) -> Self {
        Expr::Column(ColumnRef {
            name: name.to_string(),
            table_reference: Some(format!("@{}", table)),
            ..Default::default()
        })
    }

    /// Bitfield field `column.field`
    pub fn field(name: &str, field: &str) -> Self {
        Expr::Column(ColumnRef {
            name: name.to_string(),
            field: Some(field.to_string()),
            ..Default::default()
        })
    }

    /// `column#shift`
    pub fn shifted(name: &str, shift: i64) -> Self {
        Expr::Column(ColumnRef {
            name: name.to_string(),
            shift: Some(Box::new(Expr::Number(shift as f64))),
            ..Default::default()
        })
    }

    pub fn star() -> Self {
        Expr::Star { table_reference: None }
    }

    pub fn variable(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.to_string(),
            args,
        }
    }

    pub fn binary(op: &str, lhs: Expr, rhs: Expr) -> Self {
        Self::function(op, vec![lhs, rhs])
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::binary("and", lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Self::binary("or", lhs, rhs)
    }

    /// `lhs IN (values)`; the tested value goes last
    pub fn in_list(lhs: Expr, values: Vec<Expr>) -> Self {
        let mut args = values;
        args.push(lhs);
        Self::function("in", args)
    }
}

fn is_operator(name: &str) -> bool {
    matches!(
        name,
        "+" | "-" | "*" | "/" | "=" | "<>" | "<" | ">" | "<=" | ">=" | "and" | "or"
    )
}

fn write_list(f: &mut std::fmt::Formatter<'_>, items: &[Expr]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{}", v),
            Expr::Null => write!(f, "NULL"),
            Expr::String(s) => write!(f, "'{}'", s),
            Expr::Column(c) => {
                write!(f, "{}", c.name)?;
                if let Some(field) = &c.field {
                    write!(f, ".{}", field)?;
                }
                if let Some(reference) = &c.table_reference {
                    write!(f, "{}", reference)?;
                }
                if let Some(index) = &c.index {
                    write!(f, "[{}]", index)?;
                }
                if let Some((begin, end)) = c.range {
                    write!(f, "[{}:{}]", begin, end)?;
                }
                if let Some(shift) = &c.shift {
                    write!(f, "#{}", shift)?;
                }
                Ok(())
            }
            Expr::Variable(name) => write!(f, "${}", name),
            Expr::Star { table_reference } => {
                write!(f, "*{}", table_reference.as_deref().unwrap_or(""))
            }
            Expr::Function { name, args } if args.len() == 2 && is_operator(name) => {
                write!(f, "({} {} {})", args[0], name, args[1])
            }
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Match { exprs, subquery } => {
                write!(f, "match(")?;
                write_list(f, exprs)?;
                write!(f, ") in ({})", subquery)
            }
        }
    }
}

impl SelectStatement {
    pub fn new(select: Vec<Expr>) -> Self {
        Self {
            select: select.into_iter().map(|e| (e, None)).collect(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, index: usize, alias: &str) -> Self {
        if let Some(item) = self.select.get_mut(index) {
            item.1 = Some(alias.to_string());
        }
        self
    }

    pub fn from(mut self, table: &str) -> Self {
        self.from.push(TableRef {
            name: table.to_string(),
            database: None,
        });
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, expr: Expr, direction: OrderDirection) -> Self {
        self.order_by.push((expr, direction));
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn into_file(mut self, path: &str) -> Self {
        self.into = Some(path.to_string());
        self
    }
}

impl Display for SelectStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SELECT")?;
        if self.distinct {
            write!(f, " DISTINCT")?;
        }
        for (i, (expr, alias)) in self.select.iter().enumerate() {
            write!(f, "{}{}", if i == 0 { " " } else { ", " }, expr)?;
            if let Some(alias) = alias {
                write!(f, " AS {}", alias)?;
            }
        }
        if let Some(into) = &self.into {
            write!(f, " INTO '{}'", into)?;
        }
        if !self.from.is_empty() {
            let tables: Vec<String> = self
                .from
                .iter()
                .map(|t| match &t.database {
                    Some(db) => format!("{}.{}", db, t.name),
                    None => t.name.clone(),
                })
                .collect();
            write!(f, " FROM {}", tables.join(", "))?;
        }
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {}", w)?;
        }
        if !self.group_by.is_empty() {
            let items: Vec<String> = self.group_by.iter().map(|e| e.to_string()).collect();
            write!(f, " GROUP BY {}", items.join(", "))?;
        }
        if !self.order_by.is_empty() {
            let items: Vec<String> = self
                .order_by
                .iter()
                .map(|(e, d)| match d {
                    OrderDirection::Asc => format!("{} ASC", e),
                    OrderDirection::Desc => format!("{} DESC", e),
                })
                .collect();
            write!(f, " ORDER BY {}", items.join(", "))?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statement::Select(select) => write!(f, "{}", select),
            Statement::Insert { table_name, .. } => write!(f, "INSERT INTO {}", table_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Expr, OrderDirection, SelectStatement};

    #[test]
    fn test_display() {
        let stmt = SelectStatement::new(vec![
            Expr::column("rcol"),
            Expr::function("count", vec![Expr::star()]),
        ])
        .alias(1, "n")
        .from("t")
        .filter(Expr::binary(">", Expr::column("icol"), Expr::number(1.0)))
        .order_by(Expr::column("rcol"), OrderDirection::Desc);
        assert_eq!(
            stmt.to_string(),
            "SELECT rcol, count(*) AS n FROM t WHERE (icol > 1) ORDER BY rcol DESC"
        );
        assert_eq!(Expr::shifted("x", -1).to_string(), "x#-1");
        assert_eq!(Expr::in_list(Expr::column("a"), vec![Expr::number(1.0)]).to_string(), "in(1,a)");
    }
}
