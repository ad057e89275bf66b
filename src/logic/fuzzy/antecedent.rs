use super::{CrispInputs, FuzzyError, VariableRegistry};
use serde::{Deserialize, Serialize};

/// Antecedent tree. AND is `min`, OR is `max`.
///
/// Rule files spell leaves as `{ is: [soil_moisture, wet] }` and branches as
/// `{ and: [<left>, <right>] }` / `{ or: [<left>, <right>] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Antecedent {
    Is(String, String),
    And(Box<Antecedent>, Box<Antecedent>),
    Or(Box<Antecedent>, Box<Antecedent>),
}

impl Antecedent {
    pub fn is(variable: impl Into<String>, label: impl Into<String>) -> Self {
        Antecedent::Is(variable.into(), label.into())
    }

    pub fn and(self, other: Antecedent) -> Self {
        Antecedent::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Antecedent) -> Self {
        Antecedent::Or(Box::new(self), Box::new(other))
    }

    /// Firing degree for the given crisp inputs. Each leaf fuzzifies one
    /// input against one set.
    pub fn evaluate(
        &self,
        registry: &VariableRegistry,
        inputs: &CrispInputs,
    ) -> Result<f64, FuzzyError> {
        match self {
            Antecedent::Is(variable, label) => {
                let x = inputs
                    .get(variable)
                    .copied()
                    .ok_or_else(|| FuzzyError::MissingInput(variable.clone()))?;
                registry.degree_of(variable, label, x)
            }
            Antecedent::And(left, right) => {
                let l = left.evaluate(registry, inputs)?;
                let r = right.evaluate(registry, inputs)?;
                Ok(l.min(r))
            }
            Antecedent::Or(left, right) => {
                let l = left.evaluate(registry, inputs)?;
                let r = right.evaluate(registry, inputs)?;
                Ok(l.max(r))
            }
        }
    }

    /// Every `(variable, label)` leaf, left to right.
    pub fn leaves(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Antecedent::Is(variable, label) => out.push((variable, label)),
            Antecedent::And(left, right) | Antecedent::Or(left, right) => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }
}

impl std::fmt::Display for Antecedent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Antecedent::Is(variable, label) => write!(f, "{} is {}", variable, label),
            Antecedent::And(left, right) => write!(f, "({} AND {})", left, right),
            Antecedent::Or(left, right) => write!(f, "({} OR {})", left, right),
        }
    }
}
