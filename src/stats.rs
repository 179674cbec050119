use serde::{Deserialize, Serialize};

/// Online mean and variance (Welford), plus extremes.
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    pub fn report(&self) -> AccumulatorReport {
        let (mean, min, max) = if self.n_vals > 0 {
            (self.mean, self.min, self.max)
        } else {
            (f64::NAN, f64::NAN, f64::NAN)
        };
        AccumulatorReport {
            n_vals: self.n_vals,
            mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
            min,
            max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_sample_statistics() {
        let mut acc = Accumulator::new();
        for val in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.add(val);
        }
        let report = acc.report();
        assert_eq!(report.n_vals, 8);
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(report.min, 2.0);
        assert_eq!(report.max, 9.0);
    }

    #[test]
    fn empty_report_is_nan() {
        let report = Accumulator::new().report();
        assert_eq!(report.n_vals, 0);
        assert!(report.mean.is_nan());
        assert!(report.std_dev.is_nan());
        assert!(report.min.is_nan());
    }
}
