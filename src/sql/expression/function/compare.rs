use crate::{
    error::{Error, Result},
    sql::{
        expression::{Expression, RowContext},
        types::{SqlType, TypeKind, trim},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }

    fn test<T: PartialOrd>(&self, a: T, b: T) -> bool {
        match self {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Gt => a > b,
            CompareOp::Le => a <= b,
            CompareOp::Ge => a >= b,
        }
    }
}

/// How the two operands of a comparison are read, chosen once at prepare time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coercion {
    IntInt,
    IntDouble,
    DoubleInt,
    #[default]
    DoubleDouble,
    Text,
}

impl Coercion {
    /// Fails when exactly one side is a string
    pub fn select(lhs: &SqlType, rhs: &SqlType, treat_integers_as_doubles: bool) -> Result<Self> {
        let (ls, rs) = (lhs.kind == TypeKind::String, rhs.kind == TypeKind::String);
        if ls != rs {
            return Err(Error::BadValue(format!(
                "cannot compare a value of type {} with a value of type {}",
                lhs.name, rhs.name
            )));
        }
        if ls {
            return Ok(Coercion::Text);
        }
        if treat_integers_as_doubles {
            return Ok(Coercion::DoubleDouble);
        }
        Ok(match (lhs.kind.is_integral(), rhs.kind.is_integral()) {
            (true, true) => Coercion::IntInt,
            (true, false) => Coercion::IntDouble,
            (false, true) => Coercion::DoubleInt,
            (false, false) => Coercion::DoubleDouble,
        })
    }
}

/// Operand read once so that IN can test it against many values
enum Operand {
    Number(f64),
    Text(String),
}

fn read(expr: &mut Expression, coercion: Coercion, ctx: &RowContext) -> Option<Operand> {
    if coercion == Coercion::Text {
        expr.eval_as_string(ctx).map(Operand::Text)
    } else {
        expr.eval(ctx).map(Operand::Number)
    }
}

fn test(op: CompareOp, coercion: Coercion, a: &Operand, b: &Operand) -> bool {
    match (a, b) {
        (Operand::Text(a), Operand::Text(b)) => op.test(trim(a), trim(b)),
        (Operand::Number(a), Operand::Number(b)) => match coercion {
            Coercion::IntInt => op.test(*a as i64, *b as i64),
            Coercion::IntDouble => op.test((*a as i64) as f64, *b),
            Coercion::DoubleInt => op.test(*a, (*b as i64) as f64),
            Coercion::DoubleDouble | Coercion::Text => op.test(*a, *b),
        },
        _ => false,
    }
}

fn bool_value(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Binary comparison; missing when either side is missing
pub fn compare(op: CompareOp, coercion: Coercion, args: &mut [Expression], ctx: &RowContext) -> Option<f64> {
    let [lhs, rhs] = args else {
        return None;
    };
    let a = read(lhs, coercion, ctx);
    let b = read(rhs, coercion, ctx);
    Some(bool_value(test(op, coercion, &a?, &b?)))
}

/// Membership of the last argument among the others
pub fn is_in(negated: bool, coercion: Coercion, args: &mut [Expression], ctx: &RowContext) -> Option<f64> {
    let (value, candidates) = args.split_last_mut()?;
    let value = read(value, coercion, ctx)?;
    let mut found = false;
    for candidate in candidates {
        if let Some(c) = read(candidate, coercion, ctx) {
            if test(CompareOp::Eq, coercion, &value, &c) {
                found = true;
                break;
            }
        }
    }
    Some(bool_value(found != negated))
}
