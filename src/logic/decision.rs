use crate::models::PumpState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),
}

/// Scores strictly above `above` map to `state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub above: f64,
    pub state: PumpState,
}

/// Ordered threshold table mapping a defuzzified score to a pump state.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPolicy {
    tiers: Vec<Tier>,
    otherwise: PumpState,
}

impl DecisionPolicy {
    /// `> 65` HIGH, `> 15` LOW, else OFF.
    pub fn three_tier() -> Self {
        Self {
            tiers: vec![
                Tier {
                    above: 65.0,
                    state: PumpState::High,
                },
                Tier {
                    above: 15.0,
                    state: PumpState::Low,
                },
            ],
            otherwise: PumpState::Off,
        }
    }

    /// `> 50` ON, else OFF.
    pub fn binary() -> Self {
        Self {
            tiers: vec![Tier {
                above: 50.0,
                state: PumpState::On,
            }],
            otherwise: PumpState::Off,
        }
    }

    /// Tiers must have finite, strictly descending thresholds.
    pub fn new(tiers: Vec<Tier>, otherwise: PumpState) -> Result<Self, PolicyError> {
        if let Some(tier) = tiers.iter().find(|t| !t.above.is_finite()) {
            return Err(PolicyError::InvalidPolicy(format!(
                "threshold {} is not finite",
                tier.above
            )));
        }
        for pair in tiers.windows(2) {
            if pair[1].above >= pair[0].above {
                return Err(PolicyError::InvalidPolicy(format!(
                    "thresholds must be strictly descending, got {} then {}",
                    pair[0].above, pair[1].above
                )));
            }
        }
        Ok(Self { tiers, otherwise })
    }

    /// First tier whose threshold the score strictly exceeds.
    pub fn map(&self, score: f64) -> PumpState {
        self.tiers
            .iter()
            .find(|t| score > t.above)
            .map(|t| t.state)
            .unwrap_or(self.otherwise)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::three_tier()
    }
}

/// Configured form of the threshold table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierTable {
    #[default]
    ThreeTier,
    Binary,
    Custom {
        tiers: Vec<Tier>,
        #[serde(default = "default_otherwise")]
        otherwise: PumpState,
    },
}

fn default_otherwise() -> PumpState {
    PumpState::Off
}

impl TierTable {
    pub fn build(&self) -> Result<DecisionPolicy, PolicyError> {
        match self {
            TierTable::ThreeTier => Ok(DecisionPolicy::three_tier()),
            TierTable::Binary => Ok(DecisionPolicy::binary()),
            TierTable::Custom { tiers, otherwise } => DecisionPolicy::new(tiers.clone(), *otherwise),
        }
    }
}

/// What to command when no rule fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoRuleFiredPolicy {
    #[default]
    Off,
    /// Repeat the device's previous command (OFF if there is none).
    Hold,
}

impl NoRuleFiredPolicy {
    pub fn resolve(&self, previous: Option<PumpState>) -> PumpState {
        match self {
            NoRuleFiredPolicy::Off => PumpState::Off,
            NoRuleFiredPolicy::Hold => previous.unwrap_or(PumpState::Off),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_boundary_is_strict() {
        let policy = DecisionPolicy::binary();
        assert_eq!(policy.map(50.0), PumpState::Off);
        assert_eq!(policy.map(50.001), PumpState::On);
        assert_eq!(policy.map(0.0), PumpState::Off);
        assert_eq!(policy.map(100.0), PumpState::On);
    }

    #[test]
    fn three_tier_boundaries() {
        let policy = DecisionPolicy::three_tier();
        assert_eq!(policy.map(86.71), PumpState::High);
        assert_eq!(policy.map(65.0), PumpState::Low);
        assert_eq!(policy.map(65.01), PumpState::High);
        assert_eq!(policy.map(15.0), PumpState::Off);
        assert_eq!(policy.map(15.01), PumpState::Low);
        assert_eq!(policy.map(6.38), PumpState::Off);
    }

    #[test]
    fn custom_policy_validation() {
        let ascending = vec![
            Tier {
                above: 10.0,
                state: PumpState::Low,
            },
            Tier {
                above: 60.0,
                state: PumpState::High,
            },
        ];
        assert!(matches!(
            DecisionPolicy::new(ascending, PumpState::Off),
            Err(PolicyError::InvalidPolicy(_))
        ));

        let nan = vec![Tier {
            above: f64::NAN,
            state: PumpState::On,
        }];
        assert!(DecisionPolicy::new(nan, PumpState::Off).is_err());

        let policy = DecisionPolicy::new(
            vec![Tier {
                above: 30.0,
                state: PumpState::On,
            }],
            PumpState::Off,
        )
        .unwrap();
        assert_eq!(policy.map(30.5), PumpState::On);
    }

    #[test]
    fn tier_table_from_yaml() {
        let table: TierTable = serde_yaml::from_str("three_tier").unwrap();
        assert_eq!(table, TierTable::ThreeTier);

        let yaml = r#"
custom:
  tiers:
    - above: 80
      state: high
    - above: 20
      state: low
"#;
        let table: TierTable = serde_yaml::from_str(yaml).unwrap();
        let policy = table.build().unwrap();
        assert_eq!(policy.map(81.0), PumpState::High);
        assert_eq!(policy.map(50.0), PumpState::Low);
        assert_eq!(policy.map(20.0), PumpState::Off);
    }

    #[test]
    fn no_rule_fired_resolution() {
        assert_eq!(NoRuleFiredPolicy::Off.resolve(Some(PumpState::High)), PumpState::Off);
        assert_eq!(NoRuleFiredPolicy::Hold.resolve(Some(PumpState::High)), PumpState::High);
        assert_eq!(NoRuleFiredPolicy::Hold.resolve(None), PumpState::Off);
    }
}
