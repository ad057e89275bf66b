use super::{FuzzyError, MembershipFunction};

/// A named quantity partitioned into labelled fuzzy sets.
#[derive(Debug, Clone)]
pub struct LinguisticVariable {
    name: String,
    min: f64,
    max: f64,
    step: f64,
    sets: Vec<(String, MembershipFunction)>,
}

impl LinguisticVariable {
    pub fn new(name: impl Into<String>, min: f64, max: f64, step: f64) -> Result<Self, FuzzyError> {
        let name = name.into();
        let valid = min.is_finite() && max.is_finite() && step.is_finite() && min < max && step > 0.0;
        if !valid {
            return Err(FuzzyError::InvalidUniverse {
                name,
                min,
                max,
                step,
            });
        }

        Ok(Self {
            name,
            min,
            max,
            step,
            sets: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn add_set(
        &mut self,
        label: impl Into<String>,
        function: MembershipFunction,
    ) -> Result<(), FuzzyError> {
        let label = label.into();
        function.check()?;

        if self.membership(&label).is_some() {
            return Err(FuzzyError::DuplicateLabel {
                variable: self.name.clone(),
                label,
            });
        }

        self.sets.push((label, function));
        Ok(())
    }

    pub fn membership(&self, label: &str) -> Option<&MembershipFunction> {
        self.sets
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, function)| function)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|(l, _)| l.as_str())
    }

    /// Clamp a crisp value into the universe of discourse.
    pub fn clip(&self, x: f64) -> f64 {
        x.clamp(self.min, self.max)
    }

    pub fn degree(&self, label: &str, x: f64) -> Result<f64, FuzzyError> {
        let function = self
            .membership(label)
            .ok_or_else(|| FuzzyError::UnknownLabel {
                variable: self.name.clone(),
                label: label.to_string(),
            })?;
        Ok(function.evaluate(self.clip(x)))
    }

    /// Sample points `min, min + step, ...` up to and including `max`.
    pub fn samples(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1;
        (0..count)
            .map(|i| self.min + i as f64 * self.step)
            .collect()
    }
}

/// Construction-time registry of every variable a control system uses.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: Vec<LinguisticVariable>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_variable(
        &mut self,
        name: &str,
        min: f64,
        max: f64,
        step: f64,
    ) -> Result<(), FuzzyError> {
        if self.get(name).is_some() {
            return Err(FuzzyError::DuplicateVariable(name.to_string()));
        }
        self.variables
            .push(LinguisticVariable::new(name, min, max, step)?);
        Ok(())
    }

    pub fn add_set(
        &mut self,
        variable: &str,
        label: &str,
        function: MembershipFunction,
    ) -> Result<(), FuzzyError> {
        self.variables
            .iter_mut()
            .find(|v| v.name == variable)
            .ok_or_else(|| FuzzyError::UnknownVariable(variable.to_string()))?
            .add_set(label, function)
    }

    pub fn get(&self, name: &str) -> Option<&LinguisticVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&LinguisticVariable, FuzzyError> {
        self.get(name)
            .ok_or_else(|| FuzzyError::UnknownVariable(name.to_string()))
    }

    pub fn degree_of(&self, variable: &str, label: &str, x: f64) -> Result<f64, FuzzyError> {
        self.require(variable)?.degree(label, x)
    }

    pub fn variables(&self) -> &[LinguisticVariable] {
        &self.variables
    }
}
