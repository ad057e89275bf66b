use crate::error::{IrrigoError, Result};
use crate::logic::fuzzy::{ControlSystem, FuzzyError, MembershipFunction, Rule, RuleBase, VariableRegistry};
use serde::Deserialize;
use std::path::Path;

/// A control system described in YAML:
///
/// ```yaml
/// consequent: irrigation_volume
/// variables:
///   - name: soil_moisture
///     min: 0
///     max: 100
///     sets:
///       - label: wet
///         function: { shape: gaussian, mean: 80, sigma: 10 }
/// rules:
///   - antecedent: { is: [soil_moisture, wet] }
///     consequent: none
///     weight: 1.0
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ControlSystemDef {
    pub consequent: String,
    pub variables: Vec<VariableDef>,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDef {
    pub name: String,
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    pub sets: Vec<SetDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetDef {
    pub label: String,
    pub function: MembershipFunction,
}

fn default_step() -> f64 {
    1.0
}

impl ControlSystemDef {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| IrrigoError::Config(format!("Failed to parse rule file: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IrrigoError::Config(format!("Failed to read rule file {:?}: {}", path, e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn build(self) -> std::result::Result<ControlSystem, FuzzyError> {
        let mut registry = VariableRegistry::new();
        for variable in self.variables {
            registry.define_variable(&variable.name, variable.min, variable.max, variable.step)?;
            for set in variable.sets {
                registry.add_set(&variable.name, &set.label, set.function)?;
            }
        }

        let rules = RuleBase::build(&registry, &self.consequent, self.rules)?;
        ControlSystem::new(registry, rules)
    }
}
