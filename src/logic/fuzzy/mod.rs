//! Mamdani fuzzy inference: closed-form membership functions, linguistic
//! variables, min/max antecedent trees, clipped-and-maxed consequents and
//! centroid defuzzification.

pub mod antecedent;
pub mod engine;
pub mod membership;
pub mod rule_base;
pub mod variable;

pub use antecedent::Antecedent;
pub use engine::{ControlSystem, Inference};
pub use membership::MembershipFunction;
pub use rule_base::{Rule, RuleBase};
pub use variable::{LinguisticVariable, VariableRegistry};

use std::collections::BTreeMap;
use thiserror::Error;

/// Crisp value per antecedent variable name.
pub type CrispInputs = BTreeMap<String, f64>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FuzzyError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown label '{label}' on variable '{variable}'")]
    UnknownLabel { variable: String, label: String },

    #[error("Variable '{0}' is already defined")]
    DuplicateVariable(String),

    #[error("Label '{label}' already exists on variable '{variable}'")]
    DuplicateLabel { variable: String, label: String },

    #[error("Invalid universe for '{name}': [{min}, {max}] step {step}")]
    InvalidUniverse {
        name: String,
        min: f64,
        max: f64,
        step: f64,
    },

    #[error("Invalid membership function: {0}")]
    InvalidMembership(String),

    #[error("Invalid rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Rule base is empty")]
    EmptyRuleBase,

    #[error("No crisp input supplied for variable '{0}'")]
    MissingInput(String),

    /// Every rule fired with zero strength, so the aggregate has no area.
    #[error("No rule fired; the aggregate output has zero area")]
    NoRuleFired,
}
