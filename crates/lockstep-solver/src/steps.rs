use crate::sat::Var;

/// Weights of a step's terms: either one shared weight or one per term.
///
/// The shared form exists because most steps weight every term equally;
/// it only stores the weight once while the term list grows.
#[derive(Debug, Clone)]
enum StepWeights {
    Uniform(u64),
    PerTerm(Vec<u64>),
}

/// A named cost axis: a weighted sum of atoms minimized at a fixed point
/// in the solve sequence, after which its optimum is locked.
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    terms: Vec<Var>,
    weights: StepWeights,
    optimum: Option<u64>,
}

impl Step {
    /// A step whose terms all carry the same positive weight.
    pub fn uniform(name: impl Into<String>, weight: u64) -> Self {
        debug_assert!(weight > 0, "uniform step weight must be positive");
        Self {
            name: name.into(),
            terms: Vec::new(),
            weights: StepWeights::Uniform(weight),
            optimum: None,
        }
    }

    /// A step with an individual weight per term.
    pub fn weighted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terms: Vec::new(),
            weights: StepWeights::PerTerm(Vec::new()),
            optimum: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a term. A zero weight is a no-op; a nonzero weight added to a
    /// uniform step must equal the shared weight.
    pub fn add_term(&mut self, term: Var, weight: u64) {
        if weight == 0 {
            return;
        }
        match &mut self.weights {
            StepWeights::Uniform(shared) => {
                debug_assert_eq!(
                    weight, *shared,
                    "uniform step {} got weight {} instead of {}",
                    self.name, weight, shared
                );
                self.terms.push(term);
            }
            StepWeights::PerTerm(weights) => {
                self.terms.push(term);
                weights.push(weight);
            }
        }
    }

    pub fn terms(&self) -> &[Var] {
        &self.terms
    }

    /// The weight vector, materialized per term.
    pub fn weights(&self) -> Vec<u64> {
        match &self.weights {
            StepWeights::Uniform(shared) => vec![*shared; self.terms.len()],
            StepWeights::PerTerm(weights) => weights.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Lock the minimized optimum. May only happen once.
    pub fn set_optimum(&mut self, optimum: u64) {
        debug_assert!(self.optimum.is_none(), "step {} minimized twice", self.name);
        self.optimum = Some(optimum);
    }

    /// The locked optimum, once the step has been minimized.
    pub fn optimum(&self) -> Option<u64> {
        self.optimum
    }
}
