use std::time::Instant;

use indexmap::{IndexMap, IndexSet};

use crate::analysis::Analysis;
use crate::atoms::{conflict_atom, package_version_atom, AtomTable, PackageAndVersion};
use crate::catalog::Catalog;
use crate::constraints::{
    Constraint, ConstraintFormula, ConstraintMatcher, FormulaCache, VersionConstraint,
};
use crate::error::{Result, SolverError};
use crate::explain::Explainer;
use crate::input::{Input, SolveOptions, Solution};
use crate::pricer::{PricingMode, VersionPricer};
use crate::sat::{Assignment, Lit, MinimizeStrategy, SatSolver, Var};
use crate::steps::Step;

/// The package version solver.
///
/// Borrows its collaborators for its lifetime; every `solve` call builds
/// its state from scratch and discards it on return.
pub struct Solver<'a> {
    catalog: &'a dyn Catalog,
    matcher: &'a dyn ConstraintMatcher,
    pricer: &'a dyn VersionPricer,
}

impl<'a> Solver<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        matcher: &'a dyn ConstraintMatcher,
        pricer: &'a dyn VersionPricer,
    ) -> Self {
        Self {
            catalog,
            matcher,
            pricer,
        }
    }

    /// Compute one version per reachable package, optimal under the
    /// ordered cost sequence, or explain why none exists.
    pub fn solve(&self, input: &Input, options: &SolveOptions) -> Result<Solution> {
        let started = Instant::now();
        let analysis = Analysis::run(input, self.catalog, self.matcher)?;

        let mut resolution = Resolution {
            catalog: self.catalog,
            matcher: self.matcher,
            pricer: self.pricer,
            input,
            analysis,
            atoms: AtomTable::new(),
            sat: SatSolver::new(),
            formulas: FormulaCache::new(),
            constraints: Vec::new(),
            steps: IndexMap::new(),
            model: None,
        };

        resolution.assert_model()?;
        resolution.run_minimizations(options)?;
        let solution = resolution.finish(options)?;

        log::info!(
            "resolved {} packages in {:.3} seconds",
            solution.answer.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(solution)
    }
}

/// All per-solve state: atoms, clauses, collected constraints, cost steps
/// and the latest model.
struct Resolution<'a> {
    catalog: &'a dyn Catalog,
    matcher: &'a dyn ConstraintMatcher,
    pricer: &'a dyn VersionPricer,
    input: &'a Input,
    analysis: Analysis,
    atoms: AtomTable,
    sat: SatSolver,
    formulas: FormulaCache,
    constraints: Vec<Constraint>,
    steps: IndexMap<String, Step>,
    model: Option<Assignment>,
}

impl Resolution<'_> {
    fn atom(&mut self, name: &str) -> Var {
        let sat = &mut self.sat;
        self.atoms.intern(name, || sat.new_var())
    }

    fn package_var(&mut self, package: &str) -> Var {
        self.atom(package)
    }

    fn pv_var(&mut self, package: &str, version: &str) -> Var {
        let name = package_version_atom(package, version);
        self.atom(&name)
    }

    fn versions_of(&self, package: &str) -> &[String] {
        self.analysis.versions_of(self.catalog, package)
    }

    fn current(&self) -> Result<Assignment> {
        self.model
            .clone()
            .ok_or_else(|| SolverError::internal("no model available yet"))
    }

    /// The memoized boolean shape of "the selected version of `package`
    /// satisfies `constraint`".
    fn formula_for(&mut self, package: &str, constraint: &VersionConstraint) -> ConstraintFormula {
        let key = FormulaCache::key(package, constraint);
        if let Some(formula) = self.formulas.get(&key) {
            return formula.clone();
        }
        let targets: Vec<String> = self.versions_of(package).to_vec();
        let satisfying: Vec<String> = targets
            .iter()
            .filter(|version| self.matcher.satisfies(constraint, version))
            .cloned()
            .collect();
        let formula = if satisfying.len() == targets.len() {
            ConstraintFormula::Always
        } else {
            let mut literals = vec![-(self.package_var(package) as Lit)];
            for version in &satisfying {
                literals.push(self.pv_var(package, version) as Lit);
            }
            ConstraintFormula::Clause(literals)
        };
        self.formulas.insert(key, formula.clone());
        formula
    }

    /// Assert the whole boolean model and run the initial satisfiability
    /// check. The relaxed model (everything selectable, every constraint
    /// waivable) is always satisfiable, so failure here is a defect.
    fn assert_model(&mut self) -> Result<()> {
        let started = Instant::now();
        let input = self.input;
        let catalog = self.catalog;

        for root in &input.dependencies {
            let var = self.package_var(root);
            self.sat.require(&[var as Lit]);
        }

        let reachable: Vec<String> = self.analysis.reachable.iter().cloned().collect();
        for package in &reachable {
            let versions: Vec<String> = self.versions_of(package).to_vec();
            let pv_vars: Vec<Var> = versions
                .iter()
                .map(|version| self.pv_var(package, version))
                .collect();
            let package_var = self.package_var(package);

            self.sat.require_at_most_one(&pv_vars);

            // package selected <=> one of its versions selected
            let mut definition: Vec<Lit> = vec![-(package_var as Lit)];
            definition.extend(pv_vars.iter().map(|&var| var as Lit));
            self.sat.require(&definition);
            for &pv in &pv_vars {
                self.sat.require(&[-(pv as Lit), package_var as Lit]);
            }

            for (index, version) in versions.iter().enumerate() {
                for dep in catalog.dependencies_of(package, version) {
                    if dep.weak {
                        continue;
                    }
                    let target_package = dep.package.clone();
                    let target = self.package_var(&target_package);
                    self.sat
                        .require(&[-(pv_vars[index] as Lit), target as Lit]);
                }
            }
        }

        // constraint holds OR is waived OR its source is unselected
        let collected = std::mem::take(&mut self.analysis.constraints);
        for (index, collected_constraint) in collected.iter().enumerate() {
            let conflict_var = self.atom(&conflict_atom(index));
            let formula =
                self.formula_for(&collected_constraint.package, &collected_constraint.constraint);
            if let ConstraintFormula::Clause(literals) = formula {
                let mut clause: Vec<Lit> = vec![conflict_var as Lit];
                if let Some(from) = &collected_constraint.from {
                    let from_var = self.pv_var(&from.package, &from.version);
                    clause.push(-(from_var as Lit));
                }
                clause.extend(literals);
                self.sat.require(&clause);
            }
            self.constraints.push(Constraint {
                from: collected_constraint.from.clone(),
                package: collected_constraint.package.clone(),
                constraint: collected_constraint.constraint.clone(),
                conflict_var,
            });
        }

        log::info!(
            "generated {} atoms, {} clauses, {} memoized formulas in {:?}",
            self.atoms.len(),
            self.sat.num_clauses(),
            self.formulas.len(),
            started.elapsed()
        );

        match self.sat.solve() {
            Some(model) => {
                self.model = Some(model);
                Ok(())
            }
            None => Err(SolverError::internal(
                "initial satisfiability check failed on the relaxed model",
            )),
        }
    }

    fn add_step(&mut self, step: Step) {
        self.steps.insert(step.name().to_string(), step);
    }

    fn step(&self, name: &str) -> Result<&Step> {
        self.steps
            .get(name)
            .ok_or_else(|| SolverError::internal(format!("step {} was never built", name)))
    }

    fn step_optimum(&self, name: &str) -> Result<u64> {
        self.step(name)?
            .optimum()
            .ok_or_else(|| SolverError::internal(format!("step {} was never minimized", name)))
    }

    /// Minimize one step and lock its optimum before anything later runs.
    fn minimize(
        &mut self,
        name: &str,
        strategy: MinimizeStrategy,
        options: &SolveOptions,
    ) -> Result<()> {
        let step = self.step(name)?;
        let terms = step.terms().to_vec();
        let weights = step.weights();
        let current = self.current()?;

        let nudge = options.nudge;
        let mut progress = || {
            if let Some(nudge) = nudge {
                nudge();
            }
        };
        let (model, optimum) = self
            .sat
            .minimize(&current, &terms, &weights, strategy, &mut progress);
        log::debug!("step {}: optimum {}", name, optimum);

        self.model = Some(model);
        self.steps
            .get_mut(name)
            .ok_or_else(|| SolverError::internal(format!("step {} vanished", name)))?
            .set_optimum(optimum);
        Ok(())
    }

    /// Build the five `<prefix>_{incompat,major,minor,patch,rest}` steps
    /// from distances to previously selected versions.
    fn build_previous_steps(&mut self, prefix: &str, entries: &[PackageAndVersion]) {
        let mut steps = [
            Step::weighted(format!("{}_incompat", prefix)),
            Step::weighted(format!("{}_major", prefix)),
            Step::weighted(format!("{}_minor", prefix)),
            Step::weighted(format!("{}_patch", prefix)),
            Step::weighted(format!("{}_rest", prefix)),
        ];
        for entry in entries {
            let versions: Vec<String> = self.versions_of(&entry.package).to_vec();
            let costs = self
                .pricer
                .price_versions_with_previous(&versions, &entry.version);
            for (index, version) in versions.iter().enumerate() {
                let var = self.pv_var(&entry.package, version);
                steps[0].add_term(var, costs.incompat[index]);
                steps[1].add_term(var, costs.major[index]);
                steps[2].add_term(var, costs.minor[index]);
                steps[3].add_term(var, costs.patch[index]);
                steps[4].add_term(var, costs.rest[index]);
            }
        }
        for step in steps {
            self.add_step(step);
        }
    }

    /// Build the four `<prefix>_{major,minor,patch,rest}` steps from
    /// mode-priced version lists.
    fn build_priced_steps(&mut self, prefix: &str, packages: &[String], mode: PricingMode) {
        let mut steps = [
            Step::weighted(format!("{}_major", prefix)),
            Step::weighted(format!("{}_minor", prefix)),
            Step::weighted(format!("{}_patch", prefix)),
            Step::weighted(format!("{}_rest", prefix)),
        ];
        for package in packages {
            let versions: Vec<String> = self.versions_of(package).to_vec();
            let costs = self.pricer.price_versions(&versions, mode);
            for (index, version) in versions.iter().enumerate() {
                let var = self.pv_var(package, version);
                steps[0].add_term(var, costs.major[index]);
                steps[1].add_term(var, costs.minor[index]);
                steps[2].add_term(var, costs.patch[index]);
                steps[3].add_term(var, costs.rest[index]);
            }
        }
        for step in steps {
            self.add_step(step);
        }
    }

    fn minimize_group(
        &mut self,
        prefix: &str,
        axes: &[&str],
        options: &SolveOptions,
    ) -> Result<()> {
        for axis in axes {
            self.minimize(
                &format!("{}_{}", prefix, axis),
                MinimizeStrategy::TopDown,
                options,
            )?;
        }
        Ok(())
    }

    /// The fixed lexicographic minimization sequence. Order is the whole
    /// point: each step observes the locked optima of all earlier ones.
    fn run_minimizations(&mut self, options: &SolveOptions) -> Result<()> {
        let input = self.input;
        let reachable: Vec<String> = self.analysis.reachable.iter().cloned().collect();

        let mut step = Step::uniform("unknown_packages", 1);
        let unknown: Vec<String> = self.analysis.unknown.keys().cloned().collect();
        for package in &unknown {
            let var = self.package_var(package);
            step.add_term(var, 1);
        }
        self.add_step(step);
        self.minimize("unknown_packages", MinimizeStrategy::TopDown, options)?;

        let mut step = Step::uniform("conflicts", 1);
        for constraint in &self.constraints {
            step.add_term(constraint.conflict_var, 1);
        }
        self.add_step(step);
        // Conflicts are almost always zero; probing small bounds first
        // avoids walking down from the trivial all-waived model.
        self.minimize("conflicts", MinimizeStrategy::BottomUp, options)?;

        let mut step = Step::uniform("unanticipated_prereleases", 1);
        for package in &reachable {
            let versions: Vec<String> = self.versions_of(package).to_vec();
            for version in versions {
                if version.contains('-') && !input.is_anticipated_prerelease(package, &version) {
                    let var = self.pv_var(package, &version);
                    step.add_term(var, 1);
                }
            }
        }
        self.add_step(step);
        self.minimize("unanticipated_prereleases", MinimizeStrategy::TopDown, options)?;

        let to_update: Vec<String> = input
            .upgrade
            .iter()
            .filter(|package| self.analysis.reachable.contains(package.as_str()))
            .cloned()
            .collect();

        let previous_roots = self.analysis.previous_root_versions.clone();
        self.build_previous_steps("previous_root", &previous_roots);
        if !input.allow_incompatible_update {
            // Upgraded roots may move freely within their previous major;
            // anything older or across a major boundary counts as a break.
            for package in &to_update {
                if !input.is_root_dependency(package) || !input.is_in_previous_solution(package) {
                    continue;
                }
                let previous = input.previous_solution[package.as_str()].clone();
                let versions: Vec<String> = self.versions_of(package).to_vec();
                let partition = self.pricer.partition_versions(&versions, &previous);
                for version in partition.older.iter().chain(&partition.higher_major) {
                    let var = self.pv_var(package, version);
                    self.steps
                        .get_mut("previous_root_incompat")
                        .ok_or_else(|| SolverError::internal("previous_root_incompat missing"))?
                        .add_term(var, 1);
                }
            }
            self.minimize("previous_root_incompat", MinimizeStrategy::TopDown, options)?;
        }

        self.build_priced_steps("update", &to_update, PricingMode::Update);
        self.minimize_group("update", &["major", "minor", "patch", "rest"], options)?;

        if input.allow_incompatible_update {
            // Lower priority than the upgrade itself when breaking changes
            // are allowed.
            self.minimize("previous_root_incompat", MinimizeStrategy::TopDown, options)?;
        }
        self.minimize_group(
            "previous_root",
            &["major", "minor", "patch", "rest"],
            options,
        )?;

        let previous_indirect: Vec<PackageAndVersion> = input
            .previous_solution
            .iter()
            .filter(|(package, _)| {
                self.analysis.reachable.contains(package.as_str())
                    && !input.is_root_dependency(package)
            })
            .map(|(package, version)| PackageAndVersion::new(package.clone(), version.clone()))
            .collect();
        self.build_previous_steps("previous_indirect", &previous_indirect);
        self.minimize_group(
            "previous_indirect",
            &["incompat", "major", "minor", "patch", "rest"],
            options,
        )?;

        let new_roots: Vec<String> = input
            .dependencies
            .iter()
            .filter(|package| !input.is_in_previous_solution(package))
            .cloned()
            .collect();
        self.build_priced_steps("new_root", &new_roots, PricingMode::Update);
        self.minimize_group("new_root", &["major", "minor", "patch", "rest"], options)?;

        self.pin_selected()?;

        let new_indirect: Vec<String> = reachable
            .iter()
            .filter(|package| {
                !input.is_root_dependency(package)
                    && !input.is_in_previous_solution(package)
                    && !input.is_upgrading(package)
            })
            .cloned()
            .collect();
        self.build_priced_steps("new_indirect", &new_indirect, PricingMode::GravityWithPatches);
        self.minimize_group("new_indirect", &["major", "minor", "patch", "rest"], options)?;

        let mut step = Step::uniform("total_packages", 1);
        for package in &reachable {
            let var = self.package_var(package);
            step.add_term(var, 1);
        }
        self.add_step(step);
        self.minimize("total_packages", MinimizeStrategy::TopDown, options)?;

        Ok(())
    }

    /// Freeze the currently selected version of every root, previous or
    /// upgrading package: later steps may deselect such a package but not
    /// move it to another version.
    fn pin_selected(&mut self) -> Result<()> {
        let input = self.input;
        let model = self.current()?;
        let reachable: Vec<String> = self.analysis.reachable.iter().cloned().collect();

        for package in &reachable {
            if !input.is_root_dependency(package)
                && !input.is_in_previous_solution(package)
                && !input.is_upgrading(package)
            {
                continue;
            }
            let Some(package_var) = self.atoms.lookup(package) else {
                continue;
            };
            if !model.value(package_var) {
                continue;
            }
            let versions: Vec<String> = self.versions_of(package).to_vec();
            let selected = versions.iter().find(|version| {
                self.atoms
                    .lookup(&package_version_atom(package, version))
                    .is_some_and(|var| model.value(var))
            });
            if let Some(version) = selected {
                let pv = self.pv_var(package, version);
                self.sat.require(&[-(package_var as Lit), pv as Lit]);
            }
        }
        Ok(())
    }

    /// The names of every atom true under `model`.
    fn true_atom_names(&self, model: &Assignment) -> Vec<&str> {
        model
            .true_vars()
            .into_iter()
            .map(|var| self.atoms.name(var))
            .collect()
    }

    /// Read the chosen version of every selected reachable package out of
    /// the model. A true atom name containing a space is a
    /// package-version selection; the at-most-one groups guarantee each
    /// reachable package contributes at most one.
    fn decode(&self, model: &Assignment) -> Result<IndexMap<String, String>> {
        let mut selected: IndexMap<String, String> = IndexMap::new();
        for name in self.true_atom_names(model) {
            if let Some(pv) = PackageAndVersion::parse(name) {
                selected.insert(pv.package, pv.version);
            }
        }

        let mut answer = IndexMap::new();
        for package in &self.analysis.reachable {
            let Some(package_var) = self.atoms.lookup(package) else {
                continue;
            };
            if !model.value(package_var) {
                continue;
            }
            match selected.get(package.as_str()) {
                Some(version) => {
                    answer.insert(package.clone(), version.clone());
                }
                None => {
                    return Err(SolverError::internal(format!(
                        "package {} selected without a version",
                        package
                    )))
                }
            }
        }
        Ok(answer)
    }

    /// Post-solve diagnostics in priority order, then the decoded answer
    /// (with enumeration of the other optima when requested).
    fn finish(&mut self, options: &SolveOptions) -> Result<Solution> {
        let model = self.current()?;
        let answer = self.decode(&model)?;
        let input = self.input;

        if self.step_optimum("unknown_packages")? > 0 {
            let mut reasons = Vec::new();
            for (package, requirers) in &self.analysis.unknown {
                let Some(var) = self.atoms.lookup(package) else {
                    continue;
                };
                if !model.value(var) {
                    continue;
                }
                let selected: IndexSet<String> = requirers
                    .iter()
                    .filter(|pv| {
                        self.atoms
                            .lookup(&pv.to_string())
                            .is_some_and(|var| model.value(var))
                    })
                    .map(|pv| pv.to_string())
                    .collect();
                let listed: Vec<String> = selected.into_iter().collect();
                reasons.push(format!(
                    "unknown package: {}\nrequired by: {}",
                    package,
                    listed.join(", ")
                ));
            }
            return Err(SolverError::unsolvable(reasons));
        }

        if self.step_optimum("conflicts")? > 0 {
            let explainer = Explainer {
                version_map: &answer,
                constraints: &self.constraints,
                catalog: self.catalog,
                input,
            };
            let mut reasons = Vec::new();
            for constraint in &self.constraints {
                if model.value(constraint.conflict_var) {
                    reasons.push(explainer.conflict_message(constraint)?);
                }
            }
            return Err(SolverError::unsolvable(reasons));
        }

        if !input.allow_incompatible_update && self.step_optimum("previous_root_incompat")? > 0 {
            let explainer = Explainer {
                version_map: &answer,
                constraints: &self.constraints,
                catalog: self.catalog,
                input,
            };
            let mut reasons = Vec::new();
            let mut seen: IndexSet<PackageAndVersion> = IndexSet::new();
            for &term in self.step("previous_root_incompat")?.terms() {
                if !model.value(term) {
                    continue;
                }
                let Some(pv) = PackageAndVersion::parse(self.atoms.name(term)) else {
                    continue;
                };
                if !seen.insert(pv.clone()) {
                    continue;
                }
                let previous = input
                    .previous_solution
                    .get(&pv.package)
                    .cloned()
                    .unwrap_or_default();
                let mut lines = vec![format!(
                    "Breaking change required to top-level dependency: {} {}, was {}.",
                    pv.package, pv.version, previous
                )];
                lines.extend(explainer.list_constraints_on_package(&pv.package));
                reasons.push(lines.join("\n"));
            }
            reasons.push(
                "To allow breaking changes to top-level dependencies, run with --allow-incompatible-update."
                    .to_string(),
            );
            return Err(SolverError::unsolvable(reasons));
        }

        let needed = self.step_optimum("unanticipated_prereleases")? > 0;
        let all_answers = if options.all_answers {
            Some(self.enumerate(answer.clone())?)
        } else {
            None
        };

        Ok(Solution {
            answer,
            needed_unanticipated_prereleases: needed,
            all_answers,
        })
    }

    /// Enumerate every other assignment achieving the locked optima.
    /// Terminates because each round permanently forbids one full
    /// assignment out of a finite universe.
    fn enumerate(&mut self, first: IndexMap<String, String>) -> Result<Vec<IndexMap<String, String>>> {
        let mut all = vec![first];
        loop {
            let model = self.current()?;
            let description = model.literals();
            let negated: Vec<Lit> = description.iter().map(|&lit| -lit).collect();
            match self.sat.solve_assuming(&negated) {
                Some(next) => {
                    self.sat.forbid(&description);
                    let answer = self.decode(&next)?;
                    // Assignments differing only in atoms of unselected
                    // packages decode to the same map; report it once.
                    if !all.contains(&answer) {
                        all.push(answer);
                    }
                    self.model = Some(next);
                }
                None => break,
            }
        }
        log::debug!("enumerated {} optimal answers", all.len());
        Ok(all)
    }
}
