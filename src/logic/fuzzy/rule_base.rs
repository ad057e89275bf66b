use super::{Antecedent, FuzzyError, VariableRegistry};
use serde::{Deserialize, Serialize};

/// Weighted implication `antecedent => consequent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub antecedent: Antecedent,
    pub consequent: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Rule {
    pub fn new(antecedent: Antecedent, consequent: impl Into<String>) -> Self {
        Self {
            antecedent,
            consequent: consequent.into(),
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IF {} THEN {}", self.antecedent, self.consequent)?;
        if self.weight != 1.0 {
            write!(f, " [w={}]", self.weight)?;
        }
        Ok(())
    }
}

/// Validated, ordered rule list bound to a single consequent variable.
#[derive(Debug, Clone)]
pub struct RuleBase {
    consequent: String,
    rules: Vec<Rule>,
}

impl RuleBase {
    /// Check every leaf, consequent label and weight against `registry`.
    pub fn build(
        registry: &VariableRegistry,
        consequent: &str,
        rules: Vec<Rule>,
    ) -> Result<Self, FuzzyError> {
        let output = registry.require(consequent)?;

        if rules.is_empty() {
            return Err(FuzzyError::EmptyRuleBase);
        }

        for (index, rule) in rules.iter().enumerate() {
            let invalid = |reason: String| FuzzyError::InvalidRule { index, reason };

            if !(rule.weight > 0.0 && rule.weight <= 1.0) {
                return Err(invalid(format!(
                    "weight {} outside (0, 1]",
                    rule.weight
                )));
            }

            if output.membership(&rule.consequent).is_none() {
                return Err(invalid(format!(
                    "consequent label '{}' not defined on '{}'",
                    rule.consequent, consequent
                )));
            }

            for (variable, label) in rule.antecedent.leaves() {
                if variable == consequent {
                    return Err(invalid(format!(
                        "antecedent references the consequent '{}'",
                        consequent
                    )));
                }
                let var = registry
                    .get(variable)
                    .ok_or_else(|| invalid(format!("unknown variable '{}'", variable)))?;
                if var.membership(label).is_none() {
                    return Err(invalid(format!(
                        "unknown label '{}' on '{}'",
                        label, variable
                    )));
                }
            }
        }

        Ok(Self {
            consequent: consequent.to_string(),
            rules,
        })
    }

    pub fn consequent(&self) -> &str {
        &self.consequent
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Distinct antecedent variables, in first-use order.
    pub fn input_variables(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for rule in &self.rules {
            for (variable, _) in rule.antecedent.leaves() {
                if !seen.contains(&variable) {
                    seen.push(variable);
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::fuzzy::MembershipFunction;

    fn registry() -> VariableRegistry {
        let mut registry = VariableRegistry::new();
        registry.define_variable("soil_moisture", 0.0, 100.0, 1.0).unwrap();
        registry
            .add_set(
                "soil_moisture",
                "dry",
                MembershipFunction::gaussian(20.0, 10.0).unwrap(),
            )
            .unwrap();
        registry.define_variable("volume", 0.0, 100.0, 1.0).unwrap();
        registry
            .add_set(
                "volume",
                "high",
                MembershipFunction::trapezoidal(70.0, 85.0, 100.0, 100.0).unwrap(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn builds_valid_rule_base() {
        let rules = vec![Rule::new(Antecedent::is("soil_moisture", "dry"), "high")];
        let base = RuleBase::build(&registry(), "volume", rules).unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(base.consequent(), "volume");
        assert_eq!(base.input_variables(), vec!["soil_moisture"]);
    }

    #[test]
    fn rejects_bad_weight() {
        for weight in [0.0, -0.5, 1.5, f64::NAN] {
            let rules =
                vec![Rule::new(Antecedent::is("soil_moisture", "dry"), "high").with_weight(weight)];
            let err = RuleBase::build(&registry(), "volume", rules).unwrap_err();
            assert!(matches!(err, FuzzyError::InvalidRule { index: 0, .. }), "{:?}", err);
        }
    }

    #[test]
    fn rejects_unknown_references() {
        let bad_label = vec![
            Rule::new(Antecedent::is("soil_moisture", "dry"), "high"),
            Rule::new(Antecedent::is("soil_moisture", "soggy"), "high"),
        ];
        assert!(matches!(
            RuleBase::build(&registry(), "volume", bad_label),
            Err(FuzzyError::InvalidRule { index: 1, .. })
        ));

        let bad_variable = vec![Rule::new(Antecedent::is("wind", "calm"), "high")];
        assert!(matches!(
            RuleBase::build(&registry(), "volume", bad_variable),
            Err(FuzzyError::InvalidRule { index: 0, .. })
        ));

        let bad_consequent = vec![Rule::new(Antecedent::is("soil_moisture", "dry"), "flood")];
        assert!(matches!(
            RuleBase::build(&registry(), "volume", bad_consequent),
            Err(FuzzyError::InvalidRule { index: 0, .. })
        ));

        let rules = vec![Rule::new(Antecedent::is("soil_moisture", "dry"), "high")];
        assert_eq!(
            RuleBase::build(&registry(), "flow", rules).unwrap_err(),
            FuzzyError::UnknownVariable("flow".into())
        );
    }

    #[test]
    fn rejects_empty_rule_base() {
        assert_eq!(
            RuleBase::build(&registry(), "volume", Vec::new()).unwrap_err(),
            FuzzyError::EmptyRuleBase
        );
    }

    #[test]
    fn rule_display() {
        let rule = Rule::new(Antecedent::is("soil_moisture", "dry"), "high").with_weight(0.5);
        assert_eq!(rule.to_string(), "IF soil_moisture is dry THEN high [w=0.5]");
    }
}
