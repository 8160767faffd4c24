//! Date/time functions over `yyyymmdd` dates and `hhmmss` times

use chrono::{Datelike, NaiveDate};

const MAX_DATE: f64 = 99991231.0;
const MAX_TIME: f64 = 240000.0;
/// Julian day number of 0001-01-01 minus one
const JDN_OFFSET: i64 = 1721425;

fn date(d: f64) -> Option<NaiveDate> {
    if d < 0.0 || d.fract() != 0.0 || d > MAX_DATE {
        return None;
    }
    let d = d as i64;
    NaiveDate::from_ymd_opt((d / 10000) as i32, ((d / 100) % 100) as u32, (d % 100) as u32)
}

/// Seconds since midnight of an `hhmmss` value
fn seconds(t: f64) -> Option<i64> {
    if !(0.0..MAX_TIME).contains(&t) || t.fract() != 0.0 {
        return None;
    }
    let t = t as i64;
    Some((t / 10000) * 3600 + ((t / 100) % 100) * 60 + t % 100)
}

fn julian_day(d: f64) -> Option<i64> {
    Some(date(d)?.num_days_from_ce() as i64 + JDN_OFFSET)
}

/// `yyyymmddhhmmss`; date 0 is accepted
pub fn timestamp(d: f64, t: f64) -> Option<f64> {
    if !(0.0..=MAX_DATE).contains(&d) || d.fract() != 0.0 {
        return None;
    }
    seconds(t)?;
    Some(d * 1_000_000.0 + t)
}

/// Seconds from the second date/time to the first
pub fn tdiff(d1: f64, t1: f64, d2: f64, t2: f64) -> Option<f64> {
    let a = julian_day(d1)? * 86400 + seconds(t1)?;
    let b = julian_day(d2)? * 86400 + seconds(t2)?;
    i32::try_from(a - b).ok().map(|v| v as f64)
}

/// Julian date with the time of day as fraction
pub fn julian(d: f64, t: f64) -> Option<f64> {
    Some(julian_day(d)? as f64 + seconds(t)? as f64 / 86400.0)
}

pub fn julian_seconds(d: f64, t: f64) -> Option<f64> {
    Some((julian_day(d)? * 86400 + seconds(t)?) as f64)
}

#[cfg(test)]
mod tests {
    use super::{julian, julian_seconds, tdiff, timestamp};

    const DATE_DATA: [f64; 9] = [
        20210616.0, 0.0, 99991231.0, 100000000.0, 20210615.0, 20210614.0, 20210613.0, 20210612.0, 20210611.0,
    ];
    const TIME_DATA: [f64; 9] = [
        123456.0, 123456.0, 123456.0, 123456.0, 0.0, 654321.0, 6543.0, 1000000.0, 114335.0,
    ];
    const DATE_DATA2: [f64; 9] = [
        20210615.0, 20210614.0, 20210613.0, 20210612.0, 20210611.0, 20210616.0, 0.0, 99991231.0, 100000000.0,
    ];
    const TIME_DATA2: [f64; 9] = [
        0.0, 654321.0, 6543.0, 1000000.0, 114335.0, 123456.0, 123456.0, 123456.0, 123456.0,
    ];

    #[test]
    fn test_timestamp() {
        let got: Vec<Option<f64>> = DATE_DATA.iter().zip(TIME_DATA).map(|(d, t)| timestamp(*d, t)).collect();
        assert_eq!(
            got,
            vec![
                Some(20210616123456.0),
                Some(123456.0),
                Some(99991231123456.0),
                None,
                Some(20210615000000.0),
                None,
                Some(20210613006543.0),
                None,
                Some(20210611114335.0),
            ]
        );
    }

    #[test]
    fn test_tdiff() {
        let got: Vec<Option<f64>> = (0..9)
            .map(|i| tdiff(DATE_DATA[i], TIME_DATA[i], DATE_DATA2[i], TIME_DATA2[i]))
            .collect();
        assert_eq!(got, vec![Some(131696.0), None, None, None, Some(303385.0), None, None, None, None]);
    }

    #[test]
    fn test_julian() {
        assert_eq!(julian(20000101.0, 120000.0), Some(2451545.5));
        assert_eq!(julian_seconds(19700101.0, 1.0), Some(2440588.0 * 86400.0 + 1.0));
        assert_eq!(julian(0.0, 0.0), None);
    }
}
