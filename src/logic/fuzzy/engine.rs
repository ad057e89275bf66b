use super::{CrispInputs, FuzzyError, RuleBase, VariableRegistry};

/// Frozen registry + rule base with the consequent curves pre-sampled.
///
/// `compute` takes `&self` and touches no shared state, so one instance can
/// be shared across threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ControlSystem {
    registry: VariableRegistry,
    rules: RuleBase,
    universe: Vec<f64>,
    bounds: (f64, f64),
    /// Sampled consequent curve for each rule, indexed like `rules`.
    curves: Vec<Vec<f64>>,
}

/// Result of one inference pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub score: f64,
    /// Weighted firing strength of each rule, in rule order.
    pub strengths: Vec<f64>,
}

impl ControlSystem {
    pub fn new(registry: VariableRegistry, rules: RuleBase) -> Result<Self, FuzzyError> {
        let output = registry.require(rules.consequent())?;
        let universe = output.samples();
        let bounds = output.bounds();

        let curves = rules
            .rules()
            .iter()
            .map(|rule| {
                let function = output.membership(&rule.consequent).ok_or_else(|| {
                    FuzzyError::UnknownLabel {
                        variable: output.name().to_string(),
                        label: rule.consequent.clone(),
                    }
                })?;
                Ok(universe.iter().map(|u| function.evaluate(*u)).collect())
            })
            .collect::<Result<Vec<Vec<f64>>, FuzzyError>>()?;

        Ok(Self {
            registry,
            rules,
            universe,
            bounds,
            curves,
        })
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn rule_base(&self) -> &RuleBase {
        &self.rules
    }

    /// Rule evaluation, min-clipping, max-aggregation and centroid.
    ///
    /// Returns [`FuzzyError::NoRuleFired`] instead of a score when the
    /// aggregate curve has zero area.
    pub fn compute(&self, inputs: &CrispInputs) -> Result<Inference, FuzzyError> {
        let mut strengths = Vec::with_capacity(self.rules.len());
        let mut aggregate = vec![0.0_f64; self.universe.len()];

        for (rule, curve) in self.rules.rules().iter().zip(&self.curves) {
            let strength = rule.weight * rule.antecedent.evaluate(&self.registry, inputs)?;
            strengths.push(strength);

            if strength <= 0.0 {
                continue;
            }

            for (acc, mu) in aggregate.iter_mut().zip(curve) {
                *acc = acc.max(mu.min(strength));
            }
        }

        let (weighted, area) = self
            .universe
            .iter()
            .zip(&aggregate)
            .fold((0.0, 0.0), |(num, den), (u, mu)| (num + u * mu, den + mu));

        if area <= 0.0 {
            return Err(FuzzyError::NoRuleFired);
        }

        let score = (weighted / area).clamp(self.bounds.0, self.bounds.1);
        Ok(Inference { score, strengths })
    }
}
