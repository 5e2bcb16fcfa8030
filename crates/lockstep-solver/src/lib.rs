//! A package version solver.
//!
//! Given a catalog of package versions with declared dependencies, a set
//! of root dependencies, top-level version constraints, an optional
//! previous solution and a set of packages to upgrade, the solver picks
//! exactly one version per reachable package. The choice satisfies every
//! constraint and is optimal under an ordered list of cost criteria:
//! avoid unknown packages, avoid waiving constraints, avoid unanticipated
//! prereleases, stay close to the previous solution, prefer newer roots,
//! pull indirect dependencies gently, and select as few packages as
//! possible.
//!
//! Dependency semantics are translated into a boolean model (one atom per
//! package, one per package-version, one waiver atom per constraint) and
//! the cost criteria are minimized lexicographically against the `sat`
//! backend, each optimum being locked before the next criterion runs.
//! When no acceptable answer exists, reverse dependency paths from the
//! roots produce a human-readable explanation.
//!
//! ```
//! use lockstep_solver::{
//!     Dependency, Input, MemoryCatalog, SemverMatcher, SemverPricer, SolveOptions, Solver,
//! };
//!
//! let mut catalog = MemoryCatalog::new();
//! catalog.add_package("app", "1.0.0", vec![Dependency::strong("lib", "^1.0")]);
//! catalog.add_package("lib", "1.0.0", vec![]);
//!
//! let mut input = Input::new();
//! input.dependency("app");
//!
//! let matcher = SemverMatcher::new();
//! let pricer = SemverPricer::new();
//! let solver = Solver::new(&catalog, &matcher, &pricer);
//! let solution = solver.solve(&input, &SolveOptions::default()).unwrap();
//! assert_eq!(solution.answer["lib"], "1.0.0");
//! ```

pub mod analysis;
pub mod atoms;
pub mod catalog;
pub mod constraints;
pub mod error;
pub mod input;
pub mod pricer;
pub mod sat;
pub mod solver;
pub mod steps;

mod explain;
#[cfg(test)]
mod tests;

pub use atoms::PackageAndVersion;
pub use catalog::{Catalog, Dependency, MemoryCatalog};
pub use constraints::{ConstraintMatcher, SemverMatcher, VersionConstraint};
pub use error::{Result, SolverError};
pub use input::{Input, SolveOptions, Solution};
pub use pricer::{PricingMode, SemverPricer, VersionPricer};
pub use solver::Solver;
