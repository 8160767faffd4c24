/// Aggregate functions, folded one row at a time by `partial_result`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Var,
    VarP,
    Stdev,
    StdevP,
    Rms,
    Dotp,
    Norm,
}

impl AggregateKind {
    /// Runtime dispatch from a function name
    pub fn build(name: &str) -> Option<Self> {
        Some(match name.to_uppercase().as_ref() {
            "COUNT" => Self::Count,
            "SUM" => Self::Sum,
            "AVG" | "MEAN" => Self::Avg,
            "MIN" => Self::Min,
            "MAX" => Self::Max,
            "FIRST" => Self::First,
            "LAST" => Self::Last,
            "VAR" => Self::Var,
            "VARP" => Self::VarP,
            "STDEV" | "STDDEV" => Self::Stdev,
            "STDEVP" => Self::StdevP,
            "RMS" => Self::Rms,
            "DOTP" => Self::Dotp,
            "NORM" => Self::Norm,
            _ => return None,
        })
    }

    /// Aggregates over two arguments
    pub fn is_pairwise(&self) -> bool {
        matches!(self, Self::Dotp | Self::Norm)
    }
}

/// Running state of one aggregate
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    count: u64,
    sum: f64,
    sum2: f64,
    min: Option<f64>,
    max: Option<f64>,
    first: Option<f64>,
    last: Option<f64>,
}

impl Accumulator {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Folds one value; missing values are skipped
    pub fn add(&mut self, x: Option<f64>) {
        let Some(x) = x else {
            return;
        };
        self.count += 1;
        self.sum += x;
        self.sum2 += x * x;
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
        if self.first.is_none() {
            self.first = Some(x);
        }
        self.last = Some(x);
    }

    /// Folds one product; rows where either side is missing are skipped
    pub fn add_pair(&mut self, x: Option<f64>, y: Option<f64>) {
        if let (Some(x), Some(y)) = (x, y) {
            self.count += 1;
            self.sum += x * y;
        }
    }

    fn variance(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        Some((self.sum2 / n - mean * mean).max(0.0))
    }

    pub fn result(&self, kind: AggregateKind) -> Option<f64> {
        if self.count == 0 {
            return match kind {
                AggregateKind::Count => Some(0.0),
                _ => None,
            };
        }
        let n = self.count as f64;
        match kind {
            AggregateKind::Count => Some(n),
            AggregateKind::Sum | AggregateKind::Dotp => Some(self.sum),
            AggregateKind::Avg => Some(self.sum / n),
            AggregateKind::Min => self.min,
            AggregateKind::Max => self.max,
            AggregateKind::First => self.first,
            AggregateKind::Last => self.last,
            AggregateKind::Var | AggregateKind::VarP => self.variance(),
            AggregateKind::Stdev | AggregateKind::StdevP => self.variance().map(f64::sqrt),
            AggregateKind::Rms => Some((self.sum2 / n).sqrt()),
            AggregateKind::Norm => Some(self.sum.sqrt()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Accumulator, AggregateKind};

    fn fold(values: &[Option<f64>]) -> Accumulator {
        let mut acc = Accumulator::default();
        for v in values {
            acc.add(*v);
        }
        acc
    }

    #[test]
    fn test_build() {
        assert_eq!(AggregateKind::build("mean"), Some(AggregateKind::Avg));
        assert_eq!(AggregateKind::build("StdDev"), Some(AggregateKind::Stdev));
        assert_eq!(AggregateKind::build("median"), None);
    }

    #[test]
    fn test_results() {
        let acc = fold(&[Some(2.0), None, Some(4.0), Some(4.0), Some(4.0), Some(5.0), Some(5.0), Some(7.0), Some(9.0)]);
        assert_eq!(acc.result(AggregateKind::Count), Some(8.0));
        assert_eq!(acc.result(AggregateKind::Sum), Some(40.0));
        assert_eq!(acc.result(AggregateKind::Avg), Some(5.0));
        assert_eq!(acc.result(AggregateKind::Min), Some(2.0));
        assert_eq!(acc.result(AggregateKind::Max), Some(9.0));
        assert_eq!(acc.result(AggregateKind::First), Some(2.0));
        assert_eq!(acc.result(AggregateKind::Last), Some(9.0));
        assert_eq!(acc.result(AggregateKind::VarP), Some(4.0));
        assert_eq!(acc.result(AggregateKind::Stdev), Some(2.0));
    }

    #[test]
    fn test_empty() {
        let acc = fold(&[None, None]);
        assert_eq!(acc.result(AggregateKind::Count), Some(0.0));
        assert_eq!(acc.result(AggregateKind::Sum), None);
        assert_eq!(acc.result(AggregateKind::Max), None);
        assert_eq!(acc.result(AggregateKind::Rms), None);
    }

    #[test]
    fn test_pairs() {
        let mut acc = Accumulator::default();
        acc.add_pair(Some(3.0), Some(4.0));
        acc.add_pair(Some(1.0), None);
        acc.add_pair(Some(2.0), Some(2.0));
        assert_eq!(acc.result(AggregateKind::Dotp), Some(16.0));
        assert_eq!(acc.result(AggregateKind::Norm), Some(4.0));
    }
}
