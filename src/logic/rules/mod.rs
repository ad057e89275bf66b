pub mod complete;
pub mod file;
pub mod truncated;
pub mod variables;

pub use file::ControlSystemDef;
pub use variables::irrigation_variables;

use crate::error::{IrrigoError, Result};
use crate::logic::fuzzy::{ControlSystem, RuleBase};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Crisp inputs a decision cycle can supply to a control system.
pub const SUPPLIED_INPUTS: [&str; 5] = [
    variables::SOIL_MOISTURE,
    variables::TEMPERATURE,
    variables::HUMIDITY,
    variables::IS_RAINING,
    variables::RAIN_PROBABILITY,
];

/// Where the control system's rules come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetSource {
    /// The 13-rule irrigation policy.
    #[default]
    Complete,
    /// The 4-rule policy of the early cloud controller.
    Truncated,
    /// A YAML control system definition.
    File(PathBuf),
}

impl RuleSetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSetSource::Complete => "complete",
            RuleSetSource::Truncated => "truncated",
            RuleSetSource::File(_) => "file",
        }
    }
}

impl std::fmt::Display for RuleSetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSetSource::File(path) => write!(f, "file:{}", path.display()),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Build and validate the control system. Any error here is a startup
/// failure: no decision cycle may run on a broken rule base.
pub fn build_control_system(source: &RuleSetSource) -> Result<ControlSystem> {
    let system = match source {
        RuleSetSource::Complete => builtin(complete::rules())?,
        RuleSetSource::Truncated => builtin(truncated::rules())?,
        RuleSetSource::File(path) => ControlSystemDef::load(path)?.build()?,
    };

    for variable in system.rule_base().input_variables() {
        if !SUPPLIED_INPUTS.contains(&variable) {
            return Err(IrrigoError::Config(format!(
                "Rule set {} uses input '{}', which telemetry does not provide (expected one of {})",
                source,
                variable,
                SUPPLIED_INPUTS.join(", ")
            )));
        }
    }

    tracing::info!(
        rule_set = %source,
        rules = system.rule_base().len(),
        "Control system ready"
    );

    Ok(system)
}

fn builtin(rules: Vec<crate::logic::fuzzy::Rule>) -> Result<ControlSystem> {
    let registry = irrigation_variables()?;
    let rules = RuleBase::build(&registry, variables::IRRIGATION_VOLUME, rules)?;
    Ok(ControlSystem::new(registry, rules)?)
}
