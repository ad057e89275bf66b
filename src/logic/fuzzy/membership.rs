use super::FuzzyError;
use serde::{Deserialize, Serialize};

/// Shape of a fuzzy set over a variable's universe.
///
/// Evaluated in closed form at the exact crisp value, so antecedents never
/// depend on a sampling grid. Only the consequent is sampled (see
/// [`LinguisticVariable::samples`](super::LinguisticVariable::samples)).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum MembershipFunction {
    Triangular { a: f64, b: f64, c: f64 },
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
    Gaussian { mean: f64, sigma: f64 },
}

impl MembershipFunction {
    pub fn triangular(a: f64, b: f64, c: f64) -> Result<Self, FuzzyError> {
        let mf = MembershipFunction::Triangular { a, b, c };
        mf.check()?;
        Ok(mf)
    }

    pub fn trapezoidal(a: f64, b: f64, c: f64, d: f64) -> Result<Self, FuzzyError> {
        let mf = MembershipFunction::Trapezoidal { a, b, c, d };
        mf.check()?;
        Ok(mf)
    }

    pub fn gaussian(mean: f64, sigma: f64) -> Result<Self, FuzzyError> {
        let mf = MembershipFunction::Gaussian { mean, sigma };
        mf.check()?;
        Ok(mf)
    }

    /// Validate control points. Deserialized functions bypass the
    /// constructors, so the registry calls this again on `add_set`.
    pub fn check(&self) -> Result<(), FuzzyError> {
        let ok = match *self {
            MembershipFunction::Triangular { a, b, c } => {
                all_finite(&[a, b, c]) && a <= b && b <= c
            }
            MembershipFunction::Trapezoidal { a, b, c, d } => {
                all_finite(&[a, b, c, d]) && a <= b && b <= c && c <= d
            }
            MembershipFunction::Gaussian { mean, sigma } => {
                mean.is_finite() && sigma.is_finite() && sigma > 0.0
            }
        };

        if ok {
            Ok(())
        } else {
            Err(FuzzyError::InvalidMembership(format!("{:?}", self)))
        }
    }

    /// Degree of membership of `x`, always in [0, 1].
    pub fn evaluate(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return 0.0;
        }

        let degree = match *self {
            MembershipFunction::Triangular { a, b, c } => {
                if x < a || x > c {
                    0.0
                } else if x == b {
                    1.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (c - x) / (c - b)
                }
            }
            MembershipFunction::Trapezoidal { a, b, c, d } => {
                if x < a || x > d {
                    0.0
                } else if x >= b && x <= c {
                    1.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (d - x) / (d - c)
                }
            }
            MembershipFunction::Gaussian { mean, sigma } => {
                (-(x - mean).powi(2) / (2.0 * sigma.powi(2))).exp()
            }
        };

        degree.clamp(0.0, 1.0)
    }
}

fn all_finite(points: &[f64]) -> bool {
    points.iter().all(|p| p.is_finite())
}
