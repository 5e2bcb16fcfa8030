use super::clause::ClauseSet;
use super::decisions::Decisions;
use super::watch::WatchGraph;
use super::{var_of, Lit, Var};

/// Search order used by [`SatSolver::minimize`].
///
/// `BottomUp` probes bounds 0, 1, 2, ... and is the better fit when the
/// optimum is expected near zero; `TopDown` tightens from the cost of the
/// current model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimizeStrategy {
    BottomUp,
    TopDown,
}

/// A complete satisfying assignment, snapshotted from the search.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Indexed by variable; index 0 is unused.
    values: Vec<bool>,
}

impl Assignment {
    /// The value of a variable.
    #[inline]
    pub fn value(&self, var: Var) -> bool {
        self.values.get(var as usize).copied().unwrap_or(false)
    }

    /// Whether a literal holds under this assignment.
    #[inline]
    pub fn evaluate(&self, lit: Lit) -> bool {
        self.value(var_of(lit)) == (lit > 0)
    }

    /// Every variable assigned true.
    pub fn true_vars(&self) -> Vec<Var> {
        (1..self.values.len() as Var)
            .filter(|&var| self.value(var))
            .collect()
    }

    /// The weighted sum of the given terms under this assignment.
    pub fn weighted_sum(&self, terms: &[Var], weights: &[u64]) -> u64 {
        terms
            .iter()
            .zip(weights)
            .filter(|(&term, _)| self.value(term))
            .map(|(_, &weight)| weight)
            .sum()
    }

    /// The conjunction of literals describing this assignment in full,
    /// used to forbid or avoid exactly this model.
    pub fn literals(&self) -> Vec<Lit> {
        (1..self.values.len() as Var)
            .map(|var| if self.value(var) { var as Lit } else { -(var as Lit) })
            .collect()
    }
}

/// `Σ wᵢ·xᵢ ≤ max` over boolean terms, propagated natively.
#[derive(Debug, Clone)]
struct Bound {
    terms: Vec<Var>,
    weights: Vec<u64>,
    max: u64,
}

/// A branch point of the chronological search.
#[derive(Debug, Clone, Copy)]
struct Frame {
    trail_len: usize,
    lit: Lit,
    flipped: bool,
}

/// An incremental boolean solver with weighted-sum minimization.
///
/// Constraints come in three shapes: plain clauses, at-most-one groups
/// over variables (the package-version exclusivity constraint, watched
/// natively instead of being expanded into pairwise clauses), and weighted
/// bounds (used to lock each objective's optimum). Each `solve` searches
/// from scratch with a chronological DPLL; the incremental surface is in
/// the constraint store, not the search state.
#[derive(Debug, Default)]
pub struct SatSolver {
    num_vars: u32,
    clauses: ClauseSet,
    watches: WatchGraph,
    amo_groups: Vec<Vec<Var>>,
    /// Variable index into `amo_groups`.
    var_amos: Vec<Vec<u32>>,
    bounds: Vec<Bound>,
    /// Variable index into `bounds`, with the term's weight.
    var_bounds: Vec<Vec<(u32, u64)>>,
    /// Current true-weight per bound, maintained along the trail.
    sums: Vec<u64>,
    decisions: Decisions,
    frames: Vec<Frame>,
    propagate_index: usize,
}

impl SatSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable.
    pub fn new_var(&mut self) -> Var {
        self.num_vars += 1;
        self.var_amos.push(Vec::new());
        self.var_bounds.push(Vec::new());
        if self.var_amos.len() == 1 {
            // Slot 0 is unused; allocate it alongside the first variable.
            self.var_amos.push(Vec::new());
            self.var_bounds.push(Vec::new());
        }
        self.num_vars
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Require the disjunction of `literals` to hold.
    pub fn require(&mut self, literals: &[Lit]) {
        let id = self.clauses.add(literals.to_vec());
        if let Some(clause) = self.clauses.get(id) {
            self.watches.add_clause(clause);
        }
    }

    /// Require that at most one of `vars` is true.
    pub fn require_at_most_one(&mut self, vars: &[Var]) {
        if vars.len() < 2 {
            return;
        }
        let group_id = self.amo_groups.len() as u32;
        self.amo_groups.push(vars.to_vec());
        for &var in vars {
            self.var_amos[var as usize].push(group_id);
        }
    }

    /// Require `Σ wᵢ·termᵢ ≤ max` from now on.
    pub fn require_weighted_bound(&mut self, terms: &[Var], weights: &[u64], max: u64) {
        self.push_bound(terms, weights, max);
    }

    /// Permanently exclude the conjunction of `literals` (used to rule out
    /// an already-reported model during enumeration).
    pub fn forbid(&mut self, literals: &[Lit]) {
        let negated: Vec<Lit> = literals.iter().map(|&lit| -lit).collect();
        self.require(&negated);
    }

    /// Find a satisfying assignment, if one exists.
    pub fn solve(&mut self) -> Option<Assignment> {
        self.search()
    }

    /// Find a satisfying assignment under which the disjunction of
    /// `literals` additionally holds. The assumption is dropped afterwards.
    pub fn solve_assuming(&mut self, literals: &[Lit]) -> Option<Assignment> {
        let mark = self.clauses.len();
        self.require(literals);
        let model = self.search();
        self.clauses.truncate(mark);
        self.watches.remove_clauses_from(mark as u32);
        model
    }

    /// Minimize `Σ wᵢ·termᵢ` starting from `current`, then lock the
    /// optimum as a permanent bound. Returns an optimal assignment and the
    /// optimum. `progress` runs between search iterations so the host can
    /// yield.
    pub fn minimize(
        &mut self,
        current: &Assignment,
        terms: &[Var],
        weights: &[u64],
        strategy: MinimizeStrategy,
        progress: &mut dyn FnMut(),
    ) -> (Assignment, u64) {
        debug_assert_eq!(terms.len(), weights.len());

        let mut best = current.weighted_sum(terms, weights);
        let mut best_model = current.clone();
        if terms.is_empty() {
            return (best_model, 0);
        }

        match strategy {
            MinimizeStrategy::BottomUp => {
                for max in 0..best {
                    let model = self.solve_bounded(terms, weights, max);
                    progress();
                    if let Some(model) = model {
                        best = model.weighted_sum(terms, weights);
                        best_model = model;
                        break;
                    }
                }
            }
            MinimizeStrategy::TopDown => {
                while best > 0 {
                    let model = self.solve_bounded(terms, weights, best - 1);
                    progress();
                    match model {
                        Some(model) => {
                            best = model.weighted_sum(terms, weights);
                            best_model = model;
                        }
                        None => break,
                    }
                }
            }
        }

        self.push_bound(terms, weights, best);
        (best_model, best)
    }

    /// Solve under a temporary bound, dropping it afterwards.
    fn solve_bounded(&mut self, terms: &[Var], weights: &[u64], max: u64) -> Option<Assignment> {
        self.push_bound(terms, weights, max);
        let model = self.search();
        self.pop_bound();
        model
    }

    fn push_bound(&mut self, terms: &[Var], weights: &[u64], max: u64) {
        debug_assert_eq!(terms.len(), weights.len());
        let id = self.bounds.len() as u32;
        for (&term, &weight) in terms.iter().zip(weights) {
            self.var_bounds[term as usize].push((id, weight));
        }
        self.bounds.push(Bound {
            terms: terms.to_vec(),
            weights: weights.to_vec(),
            max,
        });
        self.sums.push(0);
    }

    fn pop_bound(&mut self) {
        let id = (self.bounds.len() - 1) as u32;
        let bound = self.bounds.pop().expect("no bound to pop");
        self.sums.pop();
        for &term in &bound.terms {
            self.var_bounds[term as usize].retain(|&(b, _)| b != id);
        }
    }

    /// Full restart search: seed units, then propagate / decide /
    /// backtrack until a model or exhaustion.
    fn search(&mut self) -> Option<Assignment> {
        self.decisions.reset(self.num_vars);
        self.frames.clear();
        self.propagate_index = 0;
        for sum in &mut self.sums {
            *sum = 0;
        }

        if !self.seed() {
            return None;
        }

        loop {
            if !self.propagate() {
                if !self.backtrack() {
                    return None;
                }
                continue;
            }
            match self.decisions.next_unassigned(self.num_vars) {
                Some(var) => self.decide(var),
                None => return Some(self.snapshot()),
            }
        }
    }

    /// Assert unit clauses and bound-impossible terms before searching.
    fn seed(&mut self) -> bool {
        let mut units: Vec<Lit> = Vec::new();
        for clause in self.clauses.iter() {
            if clause.is_empty() {
                return false;
            }
            if clause.is_unit() {
                units.push(clause.literals()[0]);
            }
        }
        for lit in units {
            if !self.enqueue(lit) {
                return false;
            }
        }
        let mut forced: Vec<Lit> = Vec::new();
        for bound in &self.bounds {
            for (&term, &weight) in bound.terms.iter().zip(&bound.weights) {
                if weight > bound.max {
                    forced.push(-(term as Lit));
                }
            }
        }
        for lit in forced {
            if !self.enqueue(lit) {
                return false;
            }
        }
        true
    }

    /// Record a literal as true, updating bound sums. Returns false on
    /// conflict with the current assignment.
    fn enqueue(&mut self, lit: Lit) -> bool {
        match self.decisions.lit_value(lit) {
            Some(true) => true,
            Some(false) => false,
            None => {
                self.decisions.assign(lit);
                if lit > 0 {
                    for &(bound, weight) in &self.var_bounds[lit as usize] {
                        self.sums[bound as usize] += weight;
                    }
                }
                true
            }
        }
    }

    fn decide(&mut self, var: Var) {
        // False-first keeps cost terms and optional atoms off by default.
        let lit = -(var as Lit);
        self.frames.push(Frame {
            trail_len: self.decisions.len(),
            lit,
            flipped: false,
        });
        let ok = self.enqueue(lit);
        debug_assert!(ok);
    }

    /// Process every unpropagated trail literal. Returns false on conflict.
    fn propagate(&mut self) -> bool {
        while self.propagate_index < self.decisions.len() {
            let lit = self.decisions.trail()[self.propagate_index];
            self.propagate_index += 1;

            if lit > 0 {
                if !self.propagate_groups(var_of(lit)) {
                    return false;
                }
                if !self.propagate_bounds(var_of(lit)) {
                    return false;
                }
            }
            if !self.propagate_clauses(lit) {
                return false;
            }
        }
        true
    }

    /// A variable became true: every other member of its at-most-one
    /// groups must be false.
    fn propagate_groups(&mut self, var: Var) -> bool {
        let group_ids = self.var_amos[var as usize].clone();
        for group_id in group_ids {
            let members = self.amo_groups[group_id as usize].clone();
            for member in members {
                if member == var {
                    continue;
                }
                match self.decisions.value(member) {
                    Some(true) => return false,
                    Some(false) => {}
                    None => {
                        let ok = self.enqueue(-(member as Lit));
                        debug_assert!(ok);
                    }
                }
            }
        }
        true
    }

    /// A variable became true: check and tighten every bound it
    /// participates in.
    fn propagate_bounds(&mut self, var: Var) -> bool {
        let touched = self.var_bounds[var as usize].clone();
        for (bound_id, _) in touched {
            let sum = self.sums[bound_id as usize];
            let bound = &self.bounds[bound_id as usize];
            if sum > bound.max {
                return false;
            }
            let slack = bound.max - sum;
            let mut forced: Vec<Lit> = Vec::new();
            for (&term, &weight) in bound.terms.iter().zip(&bound.weights) {
                if weight > slack && self.decisions.value(term).is_none() {
                    forced.push(-(term as Lit));
                }
            }
            for lit in forced {
                let ok = self.enqueue(lit);
                debug_assert!(ok);
            }
        }
        true
    }

    /// `lit` became true: visit the clauses watching its negation.
    fn propagate_clauses(&mut self, lit: Lit) -> bool {
        let falsified = -lit;
        let watchers: Vec<_> = self.watches.watchers(falsified).to_vec();

        for node in watchers {
            enum Action {
                Satisfied,
                Move(Lit, Lit),
                Unit(Lit),
                Conflict,
            }

            let action = {
                let clause = match self.clauses.get(node.clause_id) {
                    Some(clause) => clause,
                    // Stale watch from a dropped temporary clause.
                    None => continue,
                };
                if self.decisions.lit_value(node.other) == Some(true) {
                    Action::Satisfied
                } else {
                    // Look for a replacement literal to watch.
                    let mut replacement = None;
                    for &candidate in clause.literals() {
                        if candidate == falsified || candidate == node.other {
                            continue;
                        }
                        if self.decisions.lit_value(candidate) != Some(false) {
                            replacement = Some(candidate);
                            break;
                        }
                    }
                    match replacement {
                        Some(to) => Action::Move(to, node.other),
                        None => match self.decisions.lit_value(node.other) {
                            None => Action::Unit(node.other),
                            Some(false) => Action::Conflict,
                            Some(true) => Action::Satisfied,
                        },
                    }
                }
            };

            match action {
                Action::Satisfied => {}
                Action::Move(to, other) => {
                    self.watches.move_watch(node.clause_id, falsified, to, other);
                }
                Action::Unit(unit) => {
                    if !self.enqueue(unit) {
                        return false;
                    }
                }
                Action::Conflict => return false,
            }
        }
        true
    }

    /// Chronologically revert to the newest unflipped decision and flip
    /// it. Returns false when the search space is exhausted.
    fn backtrack(&mut self) -> bool {
        while let Some(frame) = self.frames.pop() {
            self.shrink_trail(frame.trail_len);
            if !frame.flipped {
                let flipped_lit = -frame.lit;
                self.propagate_index = frame.trail_len;
                self.frames.push(Frame {
                    trail_len: frame.trail_len,
                    lit: flipped_lit,
                    flipped: true,
                });
                let ok = self.enqueue(flipped_lit);
                debug_assert!(ok);
                return true;
            }
        }
        false
    }

    fn shrink_trail(&mut self, len: usize) {
        let sums = &mut self.sums;
        let var_bounds = &self.var_bounds;
        self.decisions.shrink(len, |lit| {
            if lit > 0 {
                for &(bound, weight) in &var_bounds[lit as usize] {
                    sums[bound as usize] -= weight;
                }
            }
        });
        self.propagate_index = self.propagate_index.min(len);
    }

    fn snapshot(&self) -> Assignment {
        let mut values = vec![false; self.num_vars as usize + 1];
        for var in 1..=self.num_vars {
            values[var as usize] = self.decisions.value(var).unwrap_or(false);
        }
        Assignment { values }
    }
}
