//! Scalar numeric functions. Angles are in degrees.

use std::f64::consts::PI;

/// Earth radius in kilometers, one nautical mile per arc minute
pub const R_EARTH_KM: f64 = 180.0 * 60.0 / PI * 1.852;
pub const R_EARTH: f64 = R_EARTH_KM * 1000.0;
const D2R: f64 = PI / 180.0;
const R2D: f64 = 180.0 / PI;
const ZERO_POINT: f64 = 273.15;

fn bool_value(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

pub fn abs(x: f64) -> f64 {
    x.abs()
}

pub fn acos(x: f64) -> f64 {
    R2D * x.acos()
}

pub fn asin(x: f64) -> f64 {
    R2D * x.asin()
}

pub fn atan(x: f64) -> f64 {
    R2D * x.atan()
}

pub fn atan2(y: f64, x: f64) -> f64 {
    R2D * y.atan2(x)
}

pub fn cos(x: f64) -> f64 {
    (D2R * x).cos()
}

pub fn sin(x: f64) -> f64 {
    (D2R * x).sin()
}

pub fn tan(x: f64) -> f64 {
    (D2R * x).tan()
}

pub fn exp(x: f64) -> f64 {
    x.exp()
}

pub fn cosh(x: f64) -> f64 {
    x.cosh()
}

pub fn sinh(x: f64) -> f64 {
    x.sinh()
}

pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

pub fn ln(x: f64) -> f64 {
    x.ln()
}

pub fn log10(x: f64) -> f64 {
    x.log10()
}

pub fn sqrt(x: f64) -> f64 {
    x.sqrt()
}

/// Remainder with the sign of the dividend, like C `fmod`
pub fn fmod(x: f64, y: f64) -> f64 {
    x % y
}

pub fn pow(x: f64, y: f64) -> f64 {
    if y == 2.0 { x * x } else { x.powf(y) }
}

pub fn twice(x: f64) -> f64 {
    2.0 * x
}

pub fn ldexp(x: f64, exp: f64) -> f64 {
    x * 2f64.powi(exp as i32)
}

/// `len` bits of `x` starting at bit `pos`, on 32-bit integers; 0 when out of range
pub fn ibits(x: f64, pos: f64, len: f64) -> f64 {
    const MAXBITS: f64 = 32.0;
    let (x, pos, len) = (x.trunc(), pos.trunc(), len.trunc());
    if x >= i32::MIN as f64 && x <= i32::MAX as f64 && pos >= 0.0 && pos < MAXBITS && (1.0..=MAXBITS).contains(&len) {
        let mask = ((1u64 << len as u32) - 1) as i64;
        (((x as i32) >> pos as u32) as i64 & mask) as f64
    } else {
        0.0
    }
}

pub fn k2c(x: f64) -> f64 {
    x - ZERO_POINT
}

pub fn c2k(x: f64) -> f64 {
    x + ZERO_POINT
}

pub fn c2f(x: f64) -> f64 {
    9.0 * x / 5.0 + 32.0
}

pub fn f2c(x: f64) -> f64 {
    (x - 32.0) * 5.0 / 9.0
}

pub fn f2k(x: f64) -> f64 {
    c2k(f2c(x))
}

pub fn k2f(x: f64) -> f64 {
    c2f(k2c(x))
}

pub fn radians(x: f64) -> f64 {
    x * D2R
}

pub fn degrees(x: f64) -> f64 {
    x * R2D
}

pub fn speed(u: f64, v: f64) -> f64 {
    (u * u + v * v).sqrt()
}

/// Meteorological direction the wind blows from
pub fn direction(u: f64, v: f64) -> f64 {
    (atan2(-u, -v) + 360.0) % 360.0
}

fn central_angle(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    (sin(lat1) * sin(lat2) + cos(lat1) * cos(lat2) * cos(lon1 - lon2)).acos()
}

/// Great circle distance in meters
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    R_EARTH * central_angle(lat1, lon1, lat2, lon2)
}

/// Radians of arc to kilometers
pub fn km(x: f64) -> f64 {
    R_EARTH_KM * x
}

/// Great circle distance in kilometers
pub fn km4(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    R_EARTH_KM * central_angle(lat1, lon1, lat2, lon2)
}

/// Whether the observation lies within `refdist_km` of the reference point
pub fn dist(reflat: f64, reflon: f64, refdist_km: f64, obslat: f64, obslon: f64) -> f64 {
    bool_value(km4(reflat, reflon, obslat, obslon) <= refdist_km)
}

pub fn circle(x: f64, x0: f64, y: f64, y0: f64, r: f64) -> f64 {
    bool_value(pow(x - x0, 2.0) + pow(y - y0, 2.0) <= pow(r, 2.0))
}

/// Whether the observation lies within `refdeg` degrees of arc of the reference point
pub fn rad(reflat: f64, reflon: f64, refdeg: f64, obslat: f64, obslon: f64) -> f64 {
    bool_value(central_angle(reflat, reflon, obslat, obslon) <= D2R * refdeg)
}

pub fn between(x: f64, a: f64, b: f64) -> f64 {
    bool_value(x >= a && x <= b)
}

pub fn not_between(x: f64, a: f64, b: f64) -> f64 {
    bool_value(x < a || x > b)
}

pub fn between_exclude_first(x: f64, a: f64, b: f64) -> f64 {
    bool_value(x > a && x <= b)
}

pub fn between_exclude_second(x: f64, a: f64, b: f64) -> f64 {
    bool_value(x >= a && x < b)
}

pub fn between_exclude_both(x: f64, a: f64, b: f64) -> f64 {
    bool_value(x > a && x < b)
}

pub fn negate(x: f64) -> f64 {
    -x
}

pub fn not(x: f64) -> f64 {
    bool_value(x == 0.0)
}

pub fn plus(x: f64, y: f64) -> f64 {
    x + y
}

pub fn minus(x: f64, y: f64) -> f64 {
    x - y
}

pub fn divide(x: f64, y: f64) -> f64 {
    x / y
}

/// Multiplication: zero wins over a missing operand
pub fn multiply(x: Option<f64>, y: Option<f64>) -> Option<f64> {
    if (x == Some(0.0) || y == Some(0.0)) && !(x.is_none() && y.is_none()) {
        return Some(0.0);
    }
    Some(x? * y?)
}

// Integer-typed functions over yyyymmdd dates and hhmmss times

fn int(x: f64) -> i64 {
    x as i32 as i64
}

pub fn year(x: f64) -> f64 {
    int(x / 10000.0) as f64
}

pub fn month(x: f64) -> f64 {
    (int(x / 100.0) % 100) as f64
}

pub fn day(x: f64) -> f64 {
    (int(x) % 100) as f64
}

pub fn hour(x: f64) -> f64 {
    year(x)
}

pub fn minute(x: f64) -> f64 {
    month(x)
}

pub fn second(x: f64) -> f64 {
    day(x)
}

pub fn trunc(x: f64) -> f64 {
    x.trunc()
}

/// Nearest integer, halves away from zero
pub fn nint(x: f64) -> f64 {
    x.round()
}

pub fn ceil(x: f64) -> f64 {
    x.ceil()
}

pub fn floor(x: f64) -> f64 {
    x.floor()
}

/// Leading integer of a text, 0 when it has none
pub fn atoi(s: &str) -> f64 {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<f64>().map(|v| sign * v).unwrap_or(0.0)
}
