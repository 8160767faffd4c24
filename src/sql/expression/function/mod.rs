//! Builtin functions
//!
//! Functions are looked up by name and arity in a `FunctionRegistry`
//! (arity -1 accepts any number of arguments). Each entry carries a
//! `Builtin` tag that `FunctionExpression::eval` dispatches on.

use std::fmt::Display;

use regex::Regex;

use crate::{
    error::{Error, Result},
    sql::{
        ast::SelectStatement,
        expression::{Binder, Expression, NumberExpression, RowContext},
        types::{Row, TypeRef},
    },
};

pub mod agg;
pub mod compare;
pub mod math;
pub mod matching;
pub mod time;

pub use agg::{Accumulator, AggregateKind};
pub use compare::{CompareOp, Coercion};

/// Evaluation strategy of a builtin
#[derive(Debug, Clone, Copy)]
pub enum Builtin {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
    Ternary(fn(f64, f64, f64) -> f64),
    Quaternary(fn(f64, f64, f64, f64) -> f64),
    Quinary(fn(f64, f64, f64, f64, f64) -> f64),
    /// Integer-typed result of a unary function
    Integer(fn(f64) -> f64),
    Atoi,
    Multiply,
    Compare(CompareOp),
    In { negated: bool },
    And,
    Or,
    IsNull,
    NotNull,
    Nvl,
    Like,
    RLike,
    Timestamp,
    Tdiff,
    Julian,
    JulianSeconds,
    Aggregate(AggregateKind),
    RowNumber,
    Thin,
    Match,
}

impl Builtin {
    fn is_integer(&self) -> bool {
        matches!(
            self,
            Builtin::Integer(_) | Builtin::Atoi | Builtin::RowNumber | Builtin::Timestamp | Builtin::Tdiff
        )
    }

    /// Builtins whose value depends on more than their arguments
    fn is_stateful(&self) -> bool {
        matches!(
            self,
            Builtin::Aggregate(_) | Builtin::RowNumber | Builtin::Thin | Builtin::Match
        )
    }
}

fn bool_value(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// LIKE pattern as an anchored regex: `%` matches any run, `_` one character
fn like_regex(pattern: &str) -> String {
    let mut re = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    re
}

fn compile(builtin: Builtin, pattern: &str) -> Result<Regex> {
    match builtin {
        Builtin::Like => Ok(Regex::new(&like_regex(pattern))?),
        _ => Ok(Regex::new(pattern)?),
    }
}

const OPERATORS: [&str; 12] = ["+", "-", "*", "/", "=", "<>", "<", ">", "<=", ">=", "and", "or"];

/// Call of a builtin function
#[derive(Debug, Clone)]
pub struct FunctionExpression {
    pub name: String,
    pub args: Vec<Expression>,
    pub title: Option<String>,
    builtin: Builtin,
    pub(crate) ty: Option<TypeRef>,
    coercion: Coercion,
    accumulator: Accumulator,
    pattern: Option<Regex>,
    subquery: Option<Box<SelectStatement>>,
    matches: Vec<Row>,
}

impl FunctionExpression {
    pub(crate) fn new(name: &str, builtin: Builtin, args: Vec<Expression>) -> Self {
        Self {
            name: name.to_string(),
            args,
            title: None,
            builtin,
            ty: None,
            coercion: Coercion::default(),
            accumulator: Accumulator::default(),
            pattern: None,
            subquery: None,
            matches: Vec::new(),
        }
    }

    pub fn is_and(&self) -> bool {
        matches!(self.builtin, Builtin::And)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.builtin, Builtin::Aggregate(_)) || self.args.iter().any(|a| a.is_aggregate())
    }

    pub fn is_constant(&self) -> bool {
        !self.builtin.is_stateful() && self.args.iter().all(|a| a.is_constant())
    }

    pub fn prepare(&mut self, binder: &mut Binder) -> Result<()> {
        for arg in &mut self.args {
            arg.prepare(binder)?;
        }
        let treat_integers_as_doubles = binder.config.treat_integers_as_doubles;
        match self.builtin {
            Builtin::Compare(_) => {
                let (lhs, rhs) = (self.args[0].sql_type()?, self.args[1].sql_type()?);
                self.coercion = Coercion::select(&lhs, &rhs, treat_integers_as_doubles)?;
            }
            Builtin::In { .. } => {
                if self.args.len() < 2 {
                    return Err(Error::BadValue(format!("{} needs at least one value", self.name)));
                }
                let value = self.args[self.args.len() - 1].sql_type()?;
                let first = self.args[0].sql_type()?;
                self.coercion = Coercion::select(&value, &first, treat_integers_as_doubles)?;
            }
            Builtin::Like | Builtin::RLike => {
                if let Expression::String(pattern) = &self.args[1] {
                    self.pattern = Some(compile(self.builtin, &pattern.value)?);
                }
            }
            Builtin::Aggregate(_) => self.accumulator.reset(),
            Builtin::Match => {
                let subquery = self
                    .subquery
                    .as_deref()
                    .ok_or(Error::SeriousBug("match without a subquery".into()))?;
                self.matches = matching::materialize(subquery, self.args.len(), binder)?;
            }
            _ => {}
        }
        let ty = if self.builtin.is_integer() { "integer" } else { "double" };
        self.ty = Some(binder.database.types().lookup(ty)?);
        Ok(())
    }

    pub fn eval(&mut self, ctx: &RowContext) -> Option<f64> {
        let builtin = self.builtin;
        let args = &mut self.args;
        match builtin {
            Builtin::Unary(f) | Builtin::Integer(f) => Some(f(args[0].eval(ctx)?)),
            Builtin::Binary(f) => {
                let a = args[0].eval(ctx)?;
                Some(f(a, args[1].eval(ctx)?))
            }
            Builtin::Ternary(f) => {
                let a = args[0].eval(ctx)?;
                let b = args[1].eval(ctx)?;
                Some(f(a, b, args[2].eval(ctx)?))
            }
            Builtin::Quaternary(f) => {
                let a = args[0].eval(ctx)?;
                let b = args[1].eval(ctx)?;
                let c = args[2].eval(ctx)?;
                Some(f(a, b, c, args[3].eval(ctx)?))
            }
            Builtin::Quinary(f) => {
                let a = args[0].eval(ctx)?;
                let b = args[1].eval(ctx)?;
                let c = args[2].eval(ctx)?;
                let d = args[3].eval(ctx)?;
                Some(f(a, b, c, d, args[4].eval(ctx)?))
            }
            Builtin::Atoi => {
                if args[0].is_string() {
                    Some(math::atoi(&args[0].eval_as_string(ctx)?))
                } else {
                    Some(args[0].eval(ctx)?.trunc())
                }
            }
            Builtin::Multiply => {
                let a = args[0].eval(ctx);
                math::multiply(a, args[1].eval(ctx))
            }
            Builtin::Compare(op) => compare::compare(op, self.coercion, args, ctx),
            Builtin::In { negated } => compare::is_in(negated, self.coercion, args, ctx),
            Builtin::And => {
                let a = args[0].eval(ctx)?;
                if a == 0.0 {
                    return Some(0.0);
                }
                Some(bool_value(args[1].eval(ctx)? != 0.0))
            }
            Builtin::Or => {
                let a = args[0].eval(ctx)?;
                if a != 0.0 {
                    return Some(1.0);
                }
                Some(bool_value(args[1].eval(ctx)? != 0.0))
            }
            Builtin::IsNull => Some(bool_value(args[0].eval(ctx).is_none())),
            Builtin::NotNull => Some(bool_value(args[0].eval(ctx).is_some())),
            Builtin::Nvl => match args[0].eval(ctx) {
                Some(v) => Some(v),
                None => args[1].eval(ctx),
            },
            Builtin::Like | Builtin::RLike => {
                let text = args[0].eval_as_string(ctx)?;
                let compiled;
                let pattern = match &self.pattern {
                    Some(pattern) => pattern,
                    None => {
                        compiled = compile(builtin, &args[1].eval_as_string(ctx)?).ok()?;
                        &compiled
                    }
                };
                Some(bool_value(pattern.is_match(&text)))
            }
            Builtin::Timestamp => {
                let d = args[0].eval(ctx)?;
                time::timestamp(d, args[1].eval(ctx)?)
            }
            Builtin::Tdiff => {
                let d1 = args[0].eval(ctx)?;
                let t1 = args[1].eval(ctx)?;
                let d2 = args[2].eval(ctx)?;
                time::tdiff(d1, t1, d2, args[3].eval(ctx)?)
            }
            Builtin::Julian => {
                let d = args[0].eval(ctx)?;
                time::julian(d, args[1].eval(ctx)?)
            }
            Builtin::JulianSeconds => {
                let d = args[0].eval(ctx)?;
                time::julian_seconds(d, args[1].eval(ctx)?)
            }
            Builtin::Aggregate(kind) => self.accumulator.result(kind),
            Builtin::RowNumber => Some(ctx.row_number as f64),
            Builtin::Thin => {
                let n = args[0].eval(ctx)?;
                if n < 1.0 {
                    return None;
                }
                Some(bool_value(ctx.candidates.saturating_sub(1) % (n as u64) == 0))
            }
            Builtin::Match => matching::contains(args, &self.matches, ctx),
        }
    }

    /// Folds the current row into this function's aggregate, or into the
    /// aggregates among its arguments
    pub fn partial_result(&mut self, ctx: &RowContext) {
        match self.builtin {
            Builtin::Aggregate(kind) if kind.is_pairwise() => {
                let x = self.args[0].eval(ctx);
                let y = self.args[1].eval(ctx);
                self.accumulator.add_pair(x, y);
            }
            Builtin::Aggregate(_) => {
                let x = self.args[0].eval(ctx);
                self.accumulator.add(x);
            }
            _ => {
                for arg in &mut self.args {
                    arg.partial_result(ctx);
                }
            }
        }
    }

    pub fn cleanup(&mut self) {
        for arg in &mut self.args {
            arg.cleanup();
        }
        self.accumulator.reset();
        self.pattern = None;
        self.matches.clear();
    }

    pub fn simplify(&mut self, changed: &mut bool) -> Result<Option<Expression>> {
        for arg in &mut self.args {
            if let Some(replacement) = arg.simplify(changed)? {
                *arg = replacement;
                *changed = true;
            }
        }

        let empty = RowContext::default();
        if self.is_constant() {
            *changed = true;
            let value = self.eval(&empty);
            return Ok(Some(self.folded(value)));
        }

        if !matches!(self.builtin, Builtin::And | Builtin::Or) {
            return Ok(None);
        }
        for i in 0..2 {
            if !self.args[i].is_constant() {
                continue;
            }
            let Some(value) = self.args[i].eval(&empty) else {
                continue;
            };
            let other = self.args[1 - i].clone();
            *changed = true;
            return Ok(Some(match (self.builtin, value != 0.0) {
                (Builtin::And, true) | (Builtin::Or, false) => other,
                (Builtin::And, false) => self.folded(Some(0.0)),
                _ => self.folded(Some(1.0)),
            }));
        }
        Ok(None)
    }

    fn folded(&self, value: Option<f64>) -> Expression {
        let title = self.title.clone().unwrap_or_else(|| self.to_string());
        Expression::Number(NumberExpression::folded(value, title, self.ty.clone()))
    }
}

impl Display for FunctionExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.args.len() == 2 && OPERATORS.contains(&self.name.as_str()) {
            return write!(f, "({} {} {})", self.args[0], self.name, self.args[1]);
        }
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")?;
        if let Some(subquery) = &self.subquery {
            write!(f, " in ({})", subquery)?;
        }
        Ok(())
    }
}

/// Catalogue entry
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub arity: i32,
    pub help: String,
}

/// Builtins by `(name, arity)`
pub struct FunctionRegistry {
    builders: std::collections::BTreeMap<(String, i32), (Builtin, &'static str)>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            builders: std::collections::BTreeMap::new(),
        };
        for (name, arity, builtin, help) in builtins() {
            registry.register(name, arity, builtin, help);
        }
        registry
    }

    pub fn register(&mut self, name: &str, arity: i32, builtin: Builtin, help: &'static str) {
        self.builders.insert((name.to_string(), arity), (builtin, help));
    }

    /// Builds a call, preferring an exact arity over a variadic entry
    pub fn build(&self, name: &str, args: Vec<Expression>) -> Result<Expression> {
        let name = name.to_lowercase();
        let arity = args.len() as i32;
        let (builtin, _) = self
            .builders
            .get(&(name.clone(), arity))
            .or_else(|| self.builders.get(&(name.clone(), -1)))
            .ok_or_else(|| {
                if self.builders.keys().any(|(n, _)| *n == name) {
                    Error::BadValue(format!("function {} does not take {} arguments", name, arity))
                } else {
                    Error::User(format!("function {} not defined", name))
                }
            })?;
        if matches!(builtin, Builtin::Match) {
            return Err(Error::User("match needs a subquery".into()));
        }
        Ok(Expression::Function(FunctionExpression::new(&name, *builtin, args)))
    }

    /// `match(args) in (subquery)`
    pub fn build_match(&self, args: Vec<Expression>, subquery: SelectStatement) -> Result<Expression> {
        let mut function = FunctionExpression::new("match", Builtin::Match, args);
        function.subquery = Some(Box::new(subquery));
        Ok(Expression::Function(function))
    }

    pub fn functions_info(&self) -> Vec<FunctionInfo> {
        self.builders
            .iter()
            .map(|((name, arity), (_, help))| FunctionInfo {
                name: name.clone(),
                arity: *arity,
                help: help.to_string(),
            })
            .collect()
    }
}

fn builtins() -> Vec<(&'static str, i32, Builtin, &'static str)> {
    use Builtin::*;
    use math::*;

    let mut list = vec![
        ("+", 2, Binary(plus), "add"),
        ("-", 2, Binary(minus), "subtract"),
        ("-", 1, Unary(negate), "negate"),
        ("*", 2, Multiply, "multiply"),
        ("/", 2, Binary(divide), "divide"),
        ("not", 1, Unary(not), "logical not"),
        ("and", 2, And, "logical and"),
        ("or", 2, Or, "logical or"),
        ("=", 2, Compare(CompareOp::Eq), "equal to"),
        ("join", 2, Compare(CompareOp::Eq), "equality used to join tables"),
        ("<>", 2, Compare(CompareOp::Ne), "not equal to"),
        ("<", 2, Compare(CompareOp::Lt), "less than"),
        (">", 2, Compare(CompareOp::Gt), "greater than"),
        ("<=", 2, Compare(CompareOp::Le), "less or equal"),
        (">=", 2, Compare(CompareOp::Ge), "greater or equal"),
        ("in", -1, In { negated: false }, "last argument equal to one of the others"),
        ("not_in", -1, In { negated: true }, "last argument equal to none of the others"),
        ("between", 3, Ternary(between), "a <= x <= b"),
        ("not_between", 3, Ternary(not_between), "x < a or x > b"),
        ("between_exclude_first", 3, Ternary(between_exclude_first), "a < x <= b"),
        ("between_exclude_second", 3, Ternary(between_exclude_second), "a <= x < b"),
        ("between_exclude_both", 3, Ternary(between_exclude_both), "a < x < b"),
        ("abs", 1, Unary(abs), "absolute value"),
        ("fabs", 1, Unary(abs), "absolute value"),
        ("acos", 1, Unary(acos), "arc cosine"),
        ("asin", 1, Unary(asin), "arc sine"),
        ("atan", 1, Unary(atan), "arc tangent of one variable"),
        ("atan2", 2, Binary(atan2), "arc tangent of param1/param2 (y/x)"),
        ("cos", 1, Unary(cos), "cosine"),
        ("sin", 1, Unary(sin), "sine"),
        ("tan", 1, Unary(tan), "tangent"),
        ("exp", 1, Unary(exp), "base-e exponential function, e raised to x"),
        ("cosh", 1, Unary(cosh), "hyperbolic cosine"),
        ("sinh", 1, Unary(sinh), "hyperbolic sine"),
        ("tanh", 1, Unary(tanh), "hyperbolic tangent"),
        ("log", 1, Unary(ln), "natural logarithm"),
        ("log10", 1, Unary(log10), "base-10 logarithm"),
        ("ln", 1, Unary(ln), "log base e"),
        ("lg", 1, Unary(log10), "log base 10"),
        ("sqrt", 1, Unary(sqrt), "square root"),
        ("mod", 2, Binary(fmod), "remainder"),
        ("fmod", 2, Binary(fmod), "remainder"),
        ("pow", 2, Binary(pow), "x ^ y"),
        ("twice", 1, Unary(twice), "2 * x"),
        ("ldexp_double", 2, Binary(ldexp), "x * 2 ^ y"),
        ("ibits", 3, Ternary(ibits), "len bits of x from bit pos"),
        ("celsius", 1, Unary(k2c), "kelvin to celsius"),
        ("k2c", 1, Unary(k2c), "kelvin to celsius"),
        ("kelvin", 1, Unary(c2k), "celsius to kelvin"),
        ("c2k", 1, Unary(c2k), "celsius to kelvin"),
        ("c2f", 1, Unary(c2f), "celsius to fahrenheit"),
        ("f2c", 1, Unary(f2c), "fahrenheit to celsius"),
        ("f2k", 1, Unary(f2k), "fahrenheit to kelvin"),
        ("k2f", 1, Unary(k2f), "kelvin to fahrenheit"),
        ("fahrenheit", 1, Unary(k2f), "kelvin to fahrenheit"),
        ("radians", 1, Unary(radians), "degrees to radians"),
        ("deg2rad", 1, Unary(radians), "degrees to radians"),
        ("degrees", 1, Unary(degrees), "radians to degrees"),
        ("rad2deg", 1, Unary(degrees), "radians to degrees"),
        ("speed", 2, Binary(speed), "wind speed from u and v"),
        ("ff", 2, Binary(speed), "wind speed from u and v"),
        ("direction", 2, Binary(direction), "wind direction from u and v"),
        ("dd", 2, Binary(direction), "direction"),
        ("dir", 2, Binary(direction), "direction"),
        ("distance", 4, Quaternary(distance), "great circle distance in meters"),
        ("km", 1, Unary(km), "radians of arc to kilometers"),
        ("km", 4, Quaternary(km4), "great circle distance in kilometers"),
        ("dist", 5, Quinary(dist), "within a distance in kilometers of a point"),
        ("circle", 5, Quinary(circle), "within a circle"),
        ("rad", 5, Quinary(rad), "within an arc in degrees of a point"),
        ("year", 1, Integer(year), "year of yyyymmdd"),
        ("month", 1, Integer(month), "month of yyyymmdd"),
        ("day", 1, Integer(day), "day of yyyymmdd"),
        ("hour", 1, Integer(hour), "hour of hhmmss"),
        ("minute", 1, Integer(minute), "minute of hhmmss"),
        ("minutes", 1, Integer(minute), "minute of hhmmss"),
        ("second", 1, Integer(second), "second of hhmmss"),
        ("seconds", 1, Integer(second), "second of hhmmss"),
        ("trunc", 1, Integer(trunc), "integer part"),
        ("int", 1, Integer(trunc), "integer part"),
        ("nint", 1, Integer(nint), "nearest integer"),
        ("ceil", 1, Integer(ceil), "smallest integer not below x"),
        ("floor", 1, Integer(floor), "largest integer not above x"),
        ("atoi", 1, Atoi, "leading integer of a string"),
        ("isnull", 1, IsNull, "x is missing"),
        ("null", 1, IsNull, "x is missing"),
        ("not_null", 1, NotNull, "x is not missing"),
        ("nvl", 2, Nvl, "x, or y when x is missing"),
        ("like", 2, Like, "SQL pattern match"),
        ("rlike", 2, RLike, "regular expression match"),
        ("timestamp", 2, Timestamp, "yyyymmddhhmmss from date and time"),
        ("tdiff", 4, Tdiff, "seconds between two dates and times"),
        ("julian", 2, Julian, "julian date"),
        ("jd", 2, Julian, "julian date"),
        ("julian_date", 2, Julian, "julian date"),
        ("julian_seconds", 2, JulianSeconds, "julian date in seconds"),
        ("rownumber", 0, RowNumber, "number of the current output row"),
        ("thin", 2, Thin, "true every n-th row"),
        ("match", -1, Match, "tuple found in a subquery"),
    ];
    for name in [
        "count", "sum", "avg", "mean", "min", "max", "first", "last", "var", "varp", "stdev", "stddev", "stdevp",
        "rms",
    ] {
        if let Some(kind) = AggregateKind::build(name) {
            list.push((name, 1, Aggregate(kind), "aggregate"));
        }
    }
    for name in ["dotp", "norm"] {
        if let Some(kind) = AggregateKind::build(name) {
            list.push((name, 2, Aggregate(kind), "aggregate over two columns"));
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::FunctionRegistry;
    use crate::{
        config::Config,
        error::{Error, Result},
        sql::{
            expression::{Binder, Expression, RowContext},
            testing,
            types::Value,
        },
    };

    fn eval(name: &str, args: Vec<Expression>) -> Result<Option<f64>> {
        let functions = FunctionRegistry::new();
        let mut expr = functions.build(name, args)?;
        Ok(expr.eval(&RowContext::default()))
    }

    #[test]
    fn test_build() -> Result<()> {
        let functions = FunctionRegistry::new();
        assert!(matches!(functions.build("sqrt", vec![]), Err(Error::BadValue(_))));
        assert!(matches!(functions.build("nothing", vec![]), Err(Error::User(_))));
        let km = functions.build("KM", vec![Expression::number(1.0)])?;
        assert_eq!(km.to_string(), "km(1)");
        assert!(functions.functions_info().iter().any(|f| f.name == "km" && f.arity == 4));
        Ok(())
    }

    #[test]
    fn test_scalars() -> Result<()> {
        assert_eq!(eval("+", vec![Expression::number(1.0), Expression::number(2.0)])?, Some(3.0));
        assert_eq!(eval("-", vec![Expression::number(4.0)])?, Some(-4.0));
        assert_eq!(eval("sqrt", vec![Expression::missing()])?, None);
        assert_eq!(eval("*", vec![Expression::missing(), Expression::number(0.0)])?, Some(0.0));
        assert_eq!(eval("nvl", vec![Expression::missing(), Expression::number(7.0)])?, Some(7.0));
        assert_eq!(eval("isnull", vec![Expression::missing()])?, Some(1.0));
        assert_eq!(eval("and", vec![Expression::number(0.0), Expression::missing()])?, Some(0.0));
        assert_eq!(eval("or", vec![Expression::number(1.0), Expression::missing()])?, Some(1.0));
        assert_eq!(eval("between", vec![Expression::number(2.0), Expression::number(1.0), Expression::number(2.0)])?, Some(1.0));
        Ok(())
    }

    #[test]
    fn test_like() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![]);
        let ctx = RowContext::default();

        let mut like = functions.build("like", vec![Expression::string("abc.d"), Expression::string("a_c.%")])?;
        like.prepare(&mut binder)?;
        assert_eq!(like.eval(&ctx), Some(1.0));

        let mut like = functions.build("like", vec![Expression::string("abcxd"), Expression::string("a_c.%")])?;
        like.prepare(&mut binder)?;
        assert_eq!(like.eval(&ctx), Some(0.0));

        let mut rlike = functions.build("rlike", vec![Expression::string("station42"), Expression::string("[0-9]+$")])?;
        rlike.prepare(&mut binder)?;
        assert_eq!(rlike.value(&ctx)?, Value::Double(1.0));

        let mut bad = functions.build("rlike", vec![Expression::string("x"), Expression::string("(")])?;
        assert!(matches!(bad.prepare(&mut binder), Err(Error::User(_))));
        Ok(())
    }

    #[test]
    fn test_string_number_comparison() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![db.table("t")?]);
        let mut cmp = functions.build("=", vec![Expression::column("icol"), Expression::string("abc")])?;
        assert!(matches!(cmp.prepare(&mut binder), Err(Error::BadValue(_))));
        Ok(())
    }

    #[test]
    fn test_integer_typed() -> Result<()> {
        let db = testing::worked_example()?;
        let functions = FunctionRegistry::new();
        let config = Config::default();
        let mut binder = Binder::new(&db, &functions, &config, vec![]);
        let mut year = functions.build("year", vec![Expression::number(20210616.0)])?;
        year.prepare(&mut binder)?;
        assert_eq!(year.value(&RowContext::default())?, Value::Integer(2021));
        Ok(())
    }
}
