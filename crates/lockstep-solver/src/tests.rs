//! End-to-end solver scenarios.
//!
//! These exercise the full pipeline: analysis, clause generation, the
//! lexicographic minimization sequence, decoding and the explainer.

use crate::catalog::{Dependency, MemoryCatalog};
use crate::constraints::SemverMatcher;
use crate::error::SolverError;
use crate::input::{Input, SolveOptions, Solution};
use crate::pricer::SemverPricer;
use crate::solver::Solver;

fn resolve(catalog: &MemoryCatalog, input: &Input) -> Result<Solution, SolverError> {
    let matcher = SemverMatcher::new();
    let pricer = SemverPricer::new();
    Solver::new(catalog, &matcher, &pricer).solve(input, &SolveOptions::default())
}

fn resolve_all(catalog: &MemoryCatalog, input: &Input) -> Result<Solution, SolverError> {
    let matcher = SemverMatcher::new();
    let pricer = SemverPricer::new();
    let options = SolveOptions {
        all_answers: true,
        ..SolveOptions::default()
    };
    Solver::new(catalog, &matcher, &pricer).solve(input, &options)
}

fn unsolvable_message(result: Result<Solution, SolverError>) -> String {
    match result {
        Err(err @ SolverError::Unsolvable { .. }) => err.to_string(),
        Err(other) => panic!("expected an unsolvable error, got: {}", other),
        Ok(solution) => panic!("expected an error, got answer {:?}", solution.answer),
    }
}

#[test]
fn test_trivial_single_package() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer.len(), 1);
    assert_eq!(solution.answer["a"], "1.0.0");
    assert!(!solution.needed_unanticipated_prereleases);
}

#[test]
fn test_transitive_dependencies() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![Dependency::strong("b", "^1.0")]);
    catalog.add_package("b", "1.0.0", vec![Dependency::strong("c", "*")]);
    catalog.add_package("c", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "1.0.0");
    assert_eq!(solution.answer["b"], "1.0.0");
    assert_eq!(solution.answer["c"], "1.0.0");
}

#[test]
fn test_direct_conflict_reports_constraint() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![Dependency::strong("b", "=2.0.0")]);
    catalog.add_package("b", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let message = unsolvable_message(resolve(&catalog, &input));
    assert!(
        message.contains("conflict: constraint b@=2.0.0 is not satisfied by b 1.0.0."),
        "message was: {}",
        message
    );
    assert!(message.contains("* b@=2.0.0 <- a 1.0.0"));
}

#[test]
fn test_conflict_listing_includes_top_level_constraints() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![Dependency::strong("b", "=2.0.0")]);
    catalog.add_package("b", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a").constrain("b", ">=1.0.0");

    let message = unsolvable_message(resolve(&catalog, &input));
    assert!(message.contains("* b@>=1.0.0 <- top level"));
    assert!(message.contains("* b@=2.0.0 <- a 1.0.0"));
}

#[test]
fn test_shared_dependency_narrows_to_common_version() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![Dependency::strong("b", "<2.0.0")]);
    catalog.add_package("c", "1.0.0", vec![Dependency::strong("b", ">=1.5.0")]);
    catalog.add_package("b", "1.0.0", vec![]);
    catalog.add_package("b", "1.5.0", vec![]);
    catalog.add_package("b", "2.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a").dependency("c");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["b"], "1.5.0");
}

#[test]
fn test_previous_solution_sticks_without_upgrade() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("a", "1.1.0", vec![]);

    let mut input = Input::new();
    input.dependency("a").previous("a", "1.0.0");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "1.0.0");
}

#[test]
fn test_upgrade_moves_root_forward() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("a", "1.1.0", vec![]);

    let mut input = Input::new();
    input.dependency("a").previous("a", "1.0.0").upgrade("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "1.1.0");
}

#[test]
fn test_new_root_takes_newest_version() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("a", "2.0.0", vec![]);
    catalog.add_package("a", "1.5.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "2.0.0");
}

#[test]
fn test_prerelease_avoided_when_release_exists() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0-beta", vec![]);
    catalog.add_package("a", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "1.0.0");
    assert!(!solution.needed_unanticipated_prereleases);
}

#[test]
fn test_prerelease_taken_when_unavoidable() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0-beta", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "1.0.0-beta");
    assert!(solution.needed_unanticipated_prereleases);
}

#[test]
fn test_anticipated_prerelease_carries_no_flag() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0-beta", vec![]);

    let mut input = Input::new();
    input
        .dependency("a")
        .anticipate_prerelease("a", "1.0.0-beta");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "1.0.0-beta");
    assert!(!solution.needed_unanticipated_prereleases);
}

#[test]
fn test_breaking_change_to_root_is_guarded() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("a", "2.0.0", vec![]);

    let mut input = Input::new();
    input
        .dependency("a")
        .previous("a", "1.0.0")
        .constrain("a", ">=2.0.0");

    let message = unsolvable_message(resolve(&catalog, &input));
    assert!(
        message.contains("Breaking change required to top-level dependency: a 2.0.0, was 1.0.0."),
        "message was: {}",
        message
    );
    assert!(message.contains("--allow-incompatible-update"));
}

#[test]
fn test_breaking_change_allowed_with_flag() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("a", "2.0.0", vec![]);

    let mut input = Input::new();
    input
        .dependency("a")
        .previous("a", "1.0.0")
        .constrain("a", ">=2.0.0")
        .allow_incompatible_update(true);

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "2.0.0");
}

#[test]
fn test_weak_dependency_does_not_select_target() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![Dependency::weak("b", "=1.0.0")]);
    catalog.add_package("b", "1.0.0", vec![]);
    catalog.add_package("b", "2.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert!(!solution.answer.contains_key("b"));
}

#[test]
fn test_weak_dependency_constrains_selected_target() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![Dependency::weak("b", "=1.0.0")]);
    catalog.add_package("c", "1.0.0", vec![Dependency::strong("b", "*")]);
    catalog.add_package("b", "1.0.0", vec![]);
    catalog.add_package("b", "2.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a").dependency("c");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["b"], "1.0.0");
}

#[test]
fn test_unknown_root_dependency() {
    let catalog = MemoryCatalog::new();
    let mut input = Input::new();
    input.dependency("ghost");

    let message = unsolvable_message(resolve(&catalog, &input));
    assert!(message.contains("unknown package in top-level dependencies: ghost"));
}

#[test]
fn test_unknown_indirect_dependency() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![Dependency::strong("ghost", "*")]);

    let mut input = Input::new();
    input.dependency("a");

    let message = unsolvable_message(resolve(&catalog, &input));
    assert!(message.contains("unknown package: ghost"));
    assert!(message.contains("required by: a 1.0.0"));
}

#[test]
fn test_unknown_package_avoided_via_other_version() {
    // Version 2.0.0 requires a package that does not exist; the solver
    // must fall back to 1.0.0 rather than fail.
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("a", "2.0.0", vec![Dependency::strong("ghost", "*")]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["a"], "1.0.0");
}

#[test]
fn test_top_level_constraints_unsatisfiable_together() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);

    let mut input = Input::new();
    input
        .dependency("a")
        .constrain("a", ">=2.0.0")
        .constrain("a", "<1.5.0");

    let message = unsolvable_message(resolve(&catalog, &input));
    assert!(message.contains("No version of a satisfies top-level constraints"));
}

#[test]
fn test_indirect_dependency_prefers_old_line_new_patch() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("app", "1.0.0", vec![Dependency::strong("lib", "^1.0")]);
    catalog.add_package("lib", "1.0.0", vec![]);
    catalog.add_package("lib", "1.0.1", vec![]);
    catalog.add_package("lib", "1.1.0", vec![]);

    let mut input = Input::new();
    input.dependency("app");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["lib"], "1.0.1");
}

#[test]
fn test_previous_indirect_sticks() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("app", "1.0.0", vec![Dependency::strong("lib", "*")]);
    catalog.add_package("lib", "1.0.0", vec![]);
    catalog.add_package("lib", "1.1.0", vec![]);

    let mut input = Input::new();
    input.dependency("app").previous("lib", "1.0.0");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["lib"], "1.0.0");
}

#[test]
fn test_upgrade_moves_indirect_dependency() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("app", "1.0.0", vec![Dependency::strong("lib", "*")]);
    catalog.add_package("lib", "1.0.0", vec![]);
    catalog.add_package("lib", "1.1.0", vec![]);

    let mut input = Input::new();
    input
        .dependency("app")
        .previous("lib", "1.0.0")
        .upgrade("lib");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["lib"], "1.1.0");
}

#[test]
fn test_conflict_resolved_by_older_dependent() {
    // The newest b requires a c that conflicts with the root's own
    // constraint, so the solver must settle for the older b.
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("app", "1.0.0", vec![Dependency::strong("b", "*")]);
    catalog.add_package("b", "2.0.0", vec![Dependency::strong("c", ">=2.0.0")]);
    catalog.add_package("b", "1.0.0", vec![Dependency::strong("c", "^1.0")]);
    catalog.add_package("c", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("app");

    let solution = resolve(&catalog, &input).unwrap();
    assert_eq!(solution.answer["b"], "1.0.0");
    assert_eq!(solution.answer["c"], "1.0.0");
}

#[test]
fn test_only_reachable_packages_in_answer() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("stray", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve(&catalog, &input).unwrap();
    assert!(!solution.answer.contains_key("stray"));
    assert_eq!(solution.answer.len(), 1);
}

#[test]
fn test_roots_always_covered() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("b", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a").dependency("b");

    let solution = resolve(&catalog, &input).unwrap();
    assert!(solution.answer.contains_key("a"));
    assert!(solution.answer.contains_key("b"));
}

#[test]
fn test_determinism_across_invocations() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("app", "1.0.0", vec![Dependency::strong("lib", "*")]);
    catalog.add_package("lib", "1.0.0", vec![]);
    catalog.add_package("lib", "1.2.0", vec![]);
    catalog.add_package("lib", "2.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("app");

    let first = resolve(&catalog, &input).unwrap();
    let second = resolve(&catalog, &input).unwrap();
    assert_eq!(first.answer, second.answer);
}

#[test]
fn test_all_answers_returns_single_optimum() {
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let solution = resolve_all(&catalog, &input).unwrap();
    let all = solution.all_answers.expect("enumeration requested");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], solution.answer);
}

#[test]
fn test_all_answers_enumerates_ties() {
    // Two versions identical up to build metadata cost the same on every
    // axis, so both are optimal. The tie sits on an indirect package:
    // roots have their selected version pinned before enumeration and
    // cannot flip, but an indirect package is free to.
    let mut catalog = MemoryCatalog::new();
    catalog.add_package("app", "1.0.0", vec![Dependency::strong("a", "*")]);
    catalog.add_package("a", "1.0.0+left", vec![]);
    catalog.add_package("a", "1.0.0+right", vec![]);

    let mut input = Input::new();
    input.dependency("app");

    let solution = resolve_all(&catalog, &input).unwrap();
    let all = solution.all_answers.expect("enumeration requested");
    assert_eq!(all.len(), 2, "both build variants are optimal: {:?}", all);
    assert_ne!(all[0], all[1]);
    for answer in &all {
        assert_eq!(answer["app"], "1.0.0");
        assert!(answer["a"].starts_with("1.0.0+"));
    }
}

#[test]
fn test_nudge_called_during_minimization() {
    use std::cell::Cell;

    let mut catalog = MemoryCatalog::new();
    catalog.add_package("a", "1.0.0", vec![]);
    catalog.add_package("a", "1.1.0", vec![]);

    let mut input = Input::new();
    input.dependency("a");

    let calls = Cell::new(0usize);
    let nudge = || calls.set(calls.get() + 1);
    let matcher = SemverMatcher::new();
    let pricer = SemverPricer::new();
    let options = SolveOptions {
        all_answers: false,
        nudge: Some(&nudge),
    };
    Solver::new(&catalog, &matcher, &pricer)
        .solve(&input, &options)
        .unwrap();
    assert!(calls.get() > 0, "nudge should run between search iterations");
}
